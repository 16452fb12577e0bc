//! Recursive visitor over type descriptors.
//!
//! The walker computes how many bytes a descriptor covers and, when handed a
//! data block, visits every scalar run inside it. Runs are checked against the
//! block before they are touched and swapped in place when the host order
//! differs from the file order.
//!
//! Struct instance sizes are measured once per variable space and cached for
//! the lifetime of the walker, and a block walk may only visit a bounded
//! multiple of the block's bytes. Overlapping member layouts therefore cost
//! time proportional to the data, not to the nesting fan-out.

use std::cell::Cell;

use crate::container::endianness::{Endianness, FILE_ORDER, swap_elements};
use crate::container::{DataBlock, LoadError, LoadPhase, LoadResult};
use crate::prog::vars::{VariableRecord, VariableSpace};

use super::descriptor::{BaseType, MAX_TYPECHUNKS, TypeDescriptor};

/// Deepest struct-in-struct nesting accepted before the layout is treated as cyclic.
pub const MAX_STRUCT_DEPTH: usize = 32;

/// Bytes a block walk may visit per byte of the block.
pub const VISIT_BUDGET_FACTOR: usize = 4;

/// Receives each contiguous run of `count` scalars of `width` bytes.
pub trait ScalarVisitor {
    /// Whether every struct instance has to be visited, or one is enough.
    const TOUCHES_BYTES: bool;

    fn visit(&mut self, offset: usize, width: usize, count: usize) -> LoadResult<()>;

    /// Called before the instances of a struct run are walked.
    fn check_span(&self, _offset: usize, _len: usize) -> LoadResult<()> {
        Ok(())
    }
}

struct Measure;

impl ScalarVisitor for Measure {
    const TOUCHES_BYTES: bool = false;

    #[inline(always)]
    fn visit(&mut self, _offset: usize, _width: usize, _count: usize) -> LoadResult<()> {
        Ok(())
    }
}

/// Bounds-checks each run against a data block and optionally byte-swaps it.
pub struct PayloadFixer<'b> {
    bytes: &'b mut [u8],
    swap: bool,
    budget: usize,
}

impl<'b> PayloadFixer<'b> {
    pub fn new(bytes: &'b mut [u8], swap: bool) -> Self {
        let budget = bytes.len().saturating_mul(VISIT_BUDGET_FACTOR);
        Self {
            bytes,
            swap,
            budget,
        }
    }

    fn overrun(&self, offset: usize, len: usize) -> LoadResult<usize> {
        let capacity = self.bytes.len();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(end),
            Some(_) => Err(LoadError::DescriptorOverrun {
                offset,
                len,
                capacity,
            }),
            None => Err(LoadError::LayoutOverflow),
        }
    }
}

impl ScalarVisitor for PayloadFixer<'_> {
    const TOUCHES_BYTES: bool = true;

    fn visit(&mut self, offset: usize, width: usize, count: usize) -> LoadResult<()> {
        let len = width.checked_mul(count).ok_or(LoadError::LayoutOverflow)?;
        let end = self.overrun(offset, len)?;
        self.budget = self
            .budget
            .checked_sub(len)
            .ok_or(LoadError::LayoutTooComplex {
                budget: self.bytes.len().saturating_mul(VISIT_BUDGET_FACTOR),
            })?;
        if self.swap {
            swap_elements(&mut self.bytes[offset..end], width);
        }
        Ok(())
    }

    fn check_span(&self, offset: usize, len: usize) -> LoadResult<()> {
        self.overrun(offset, len).map(|_| ())
    }
}

/// What the loader does to a data block once its variable table is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadPass {
    Skip,
    /// Bounds only.
    Check,
    Swap,
}

impl PayloadPass {
    /// Swapping is required whenever the host order differs from the file
    /// order; `verify` only decides whether matching hosts still check bounds.
    pub fn for_host(host: Endianness, verify: bool) -> Self {
        if host.differs_from(FILE_ORDER) {
            PayloadPass::Swap
        } else if verify {
            PayloadPass::Check
        } else {
            PayloadPass::Skip
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpaceSize {
    Unknown,
    Measuring,
    Known(usize),
}

pub struct TypeWalker<'a> {
    spaces: &'a [VariableSpace],
    sizes: Vec<Cell<SpaceSize>>,
}

impl<'a> TypeWalker<'a> {
    pub fn new(spaces: &'a [VariableSpace]) -> Self {
        Self {
            spaces,
            sizes: vec![Cell::new(SpaceSize::Unknown); spaces.len()],
        }
    }

    /// Byte size of one value of `desc`.
    pub fn measure(&self, desc: &TypeDescriptor) -> LoadResult<usize> {
        self.walk(&mut Measure, 0, desc, 0)
    }

    /// Walks the value of `desc` stored at `offset` inside `bytes`, returning
    /// the bytes it covers.
    pub fn normalize(
        &self,
        bytes: &mut [u8],
        offset: usize,
        desc: &TypeDescriptor,
        swap: bool,
    ) -> LoadResult<usize> {
        self.walk(&mut PayloadFixer::new(bytes, swap), offset, desc, 0)
    }

    /// Walks every top-level variable of a data block at its own offset.
    pub fn normalize_block(
        &self,
        bytes: &mut [u8],
        vars: &[VariableRecord],
        swap: bool,
    ) -> LoadResult<()> {
        let mut fixer = PayloadFixer::new(bytes, swap);
        for var in vars {
            self.walk(&mut fixer, var.offset as usize, &var.ty, 0)?;
        }
        Ok(())
    }

    /// Runs `pass` over a loaded block. Failures name the phase and block.
    pub fn apply(
        &self,
        bytes: &mut [u8],
        vars: &[VariableRecord],
        pass: PayloadPass,
        phase: LoadPhase,
        block: DataBlock,
    ) -> LoadResult<()> {
        let walked = match pass {
            PayloadPass::Skip => Ok(()),
            PayloadPass::Check => self.normalize_block(bytes, vars, false),
            PayloadPass::Swap => self.normalize_block(bytes, vars, true),
        };
        walked.map_err(|err| err.in_block(phase, block))
    }

    pub fn walk<V: ScalarVisitor>(
        &self,
        visitor: &mut V,
        offset: usize,
        desc: &TypeDescriptor,
        depth: usize,
    ) -> LoadResult<usize> {
        let mut repeat: usize = 1;
        for link in 0..MAX_TYPECHUNKS {
            let tag = desc.base_types[link];
            let base = BaseType::from_tag(tag).ok_or(LoadError::UnknownTypeTag { tag, link })?;
            match base {
                BaseType::Array => {
                    repeat = repeat
                        .checked_mul(desc.counts[link] as usize)
                        .ok_or(LoadError::LayoutOverflow)?;
                }
                BaseType::Struct => {
                    return self.walk_struct(visitor, offset, desc.members, repeat, depth);
                }
                scalar => {
                    let width = scalar.scalar_width().ok_or(LoadError::UnterminatedDescriptor)?;
                    visitor.visit(offset, width, repeat)?;
                    return width.checked_mul(repeat).ok_or(LoadError::LayoutOverflow);
                }
            }
        }
        Err(LoadError::UnterminatedDescriptor)
    }

    fn members(&self, space: u32) -> LoadResult<&'a [VariableRecord]> {
        self.spaces
            .get(space as usize)
            .map(VariableSpace::vars)
            .ok_or(LoadError::BadStructRef {
                space,
                available: self.spaces.len(),
            })
    }

    /// Size of one instance of `space`, measured on first use.
    fn instance_size(&self, space: u32, depth: usize) -> LoadResult<usize> {
        if depth >= MAX_STRUCT_DEPTH {
            return Err(LoadError::StructTooDeep {
                depth: MAX_STRUCT_DEPTH,
            });
        }
        let members = self.members(space)?;
        let slot = &self.sizes[space as usize];
        match slot.get() {
            SpaceSize::Known(size) => return Ok(size),
            SpaceSize::Measuring => {
                return Err(LoadError::StructTooDeep {
                    depth: MAX_STRUCT_DEPTH,
                });
            }
            SpaceSize::Unknown => slot.set(SpaceSize::Measuring),
        }
        let measured = members.iter().try_fold(0usize, |total, member| {
            let size = self.walk(&mut Measure, 0, &member.ty, depth + 1)?;
            total.checked_add(size).ok_or(LoadError::LayoutOverflow)
        });
        slot.set(match measured {
            Ok(size) => SpaceSize::Known(size),
            Err(_) => SpaceSize::Unknown,
        });
        measured
    }

    fn walk_struct<V: ScalarVisitor>(
        &self,
        visitor: &mut V,
        offset: usize,
        space: u32,
        repeat: usize,
        depth: usize,
    ) -> LoadResult<usize> {
        let instance = self.instance_size(space, depth)?;
        if instance == 0 || repeat == 0 {
            return Ok(0);
        }
        let total = instance.checked_mul(repeat).ok_or(LoadError::LayoutOverflow)?;
        if !V::TOUCHES_BYTES {
            return Ok(total);
        }
        visitor.check_span(offset, total)?;

        let members = self.members(space)?;
        let mut base = offset;
        for _ in 0..repeat {
            for member in members {
                let at = base
                    .checked_add(member.offset as usize)
                    .ok_or(LoadError::LayoutOverflow)?;
                self.walk(visitor, at, &member.ty, depth + 1)?;
            }
            base = base.checked_add(instance).ok_or(LoadError::LayoutOverflow)?;
        }
        Ok(total)
    }
}
