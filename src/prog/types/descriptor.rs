//! On-disk type descriptors: a chain of base-type tags with per-link array
//! counts, ending in a scalar or a struct that refers to a variable space.

use crate::container::fields::{FieldDecoder, FieldEncoder};

pub const MAX_TYPECHUNKS: usize = 8;
pub const DESCRIPTOR_LEN: usize = MAX_TYPECHUNKS + MAX_TYPECHUNKS * 4 + 4;

/// Width of a string slot, which holds an index into the string pool.
pub const STRING_INDEX_WIDTH: usize = 4;
pub const POINTER_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BaseType {
    Int = 1,
    Dword = 2,
    Short = 3,
    Word = 4,
    SByte = 5,
    Byte = 6,
    Char = 8,
    Float = 9,
    String = 16,
    Array = 17,
    Struct = 18,
    Pointer = 19,
}

impl BaseType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        let base = match tag {
            1 => BaseType::Int,
            2 => BaseType::Dword,
            3 => BaseType::Short,
            4 => BaseType::Word,
            5 => BaseType::SByte,
            6 => BaseType::Byte,
            8 => BaseType::Char,
            9 => BaseType::Float,
            16 => BaseType::String,
            17 => BaseType::Array,
            18 => BaseType::Struct,
            19 => BaseType::Pointer,
            _ => return None,
        };
        Some(base)
    }

    #[inline(always)]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Byte width of one element, or `None` for the array and struct links.
    pub fn scalar_width(self) -> Option<usize> {
        match self {
            BaseType::Int | BaseType::Dword | BaseType::Float => Some(4),
            BaseType::Short | BaseType::Word => Some(2),
            BaseType::SByte | BaseType::Byte | BaseType::Char => Some(1),
            BaseType::String => Some(STRING_INDEX_WIDTH),
            BaseType::Pointer => Some(POINTER_WIDTH),
            BaseType::Array | BaseType::Struct => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub base_types: [u8; MAX_TYPECHUNKS],
    pub counts: [u32; MAX_TYPECHUNKS],
    /// Variable space index, used when the chain ends in a struct.
    pub members: u32,
}

impl TypeDescriptor {
    pub fn scalar(base: BaseType) -> Self {
        let mut base_types = [0u8; MAX_TYPECHUNKS];
        base_types[0] = base.tag();
        Self {
            base_types,
            counts: [0; MAX_TYPECHUNKS],
            members: 0,
        }
    }

    pub fn structure(space: u32) -> Self {
        Self {
            members: space,
            ..Self::scalar(BaseType::Struct)
        }
    }

    /// Wraps `element` in one more array dimension of `count` entries.
    ///
    /// Returns `None` when the element chain already uses every link.
    pub fn array_of(count: u32, element: &TypeDescriptor) -> Option<Self> {
        if element.base_types[MAX_TYPECHUNKS - 1] != 0 {
            return None;
        }
        let mut out = Self {
            base_types: [0; MAX_TYPECHUNKS],
            counts: [0; MAX_TYPECHUNKS],
            members: element.members,
        };
        out.base_types[0] = BaseType::Array.tag();
        out.counts[0] = count;
        out.base_types[1..].copy_from_slice(&element.base_types[..MAX_TYPECHUNKS - 1]);
        out.counts[1..].copy_from_slice(&element.counts[..MAX_TYPECHUNKS - 1]);
        Some(out)
    }

    /// Outermost base type, if the first tag is known.
    pub fn base(&self) -> Option<BaseType> {
        BaseType::from_tag(self.base_types[0])
    }

    pub fn is_struct(&self) -> bool {
        self.base_types
            .iter()
            .copied()
            .find(|tag| *tag != BaseType::Array.tag())
            == Some(BaseType::Struct.tag())
    }

    pub(crate) fn decode(dec: &mut FieldDecoder<'_>) -> Self {
        let base_types = dec.array::<MAX_TYPECHUNKS>();
        let mut counts = [0u32; MAX_TYPECHUNKS];
        for count in counts.iter_mut() {
            *count = dec.u32();
        }
        Self {
            base_types,
            counts,
            members: dec.u32(),
        }
    }

    pub(crate) fn encode(&self, enc: &mut FieldEncoder<'_>) {
        enc.bytes(&self.base_types);
        for count in self.counts {
            enc.u32(count);
        }
        enc.u32(self.members);
    }
}
