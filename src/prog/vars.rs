//! Variable records and the single routine that reads a table of them.
//!
//! The same table shape describes globals, locals, each procedure's private
//! and public sets, and the members of every named variable space.

use std::io::{Read, Seek};

use crate::container::LoadResult;
use crate::container::fields::{FieldDecoder, FieldEncoder};
use crate::container::reader::{ContainerReader, ContainerSeek, try_vec};

use super::types::descriptor::{DESCRIPTOR_LEN, TypeDescriptor};

pub const VARIABLE_RECORD_LEN: usize = DESCRIPTOR_LEN + 12;
pub const VARSPACE_RECORD_LEN: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableRecord {
    pub ty: TypeDescriptor,
    pub id: u32,
    /// Byte offset inside the owning data block or struct instance.
    pub offset: u32,
    pub varspace: u32,
}

impl VariableRecord {
    pub fn new(id: u32, offset: u32, ty: TypeDescriptor) -> Self {
        Self {
            ty,
            id,
            offset,
            varspace: 0,
        }
    }

    pub fn in_space(mut self, varspace: u32) -> Self {
        self.varspace = varspace;
        self
    }

    pub(crate) fn decode(dec: &mut FieldDecoder<'_>) -> Self {
        let ty = TypeDescriptor::decode(dec);
        Self {
            ty,
            id: dec.u32(),
            offset: dec.u32(),
            varspace: dec.u32(),
        }
    }

    pub(crate) fn encode(&self, enc: &mut FieldEncoder<'_>) {
        self.ty.encode(enc);
        enc.u32(self.id).u32(self.offset).u32(self.varspace);
    }

    /// Reads `count` records starting at `offset`.
    pub fn read_table<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Vec<VariableRecord>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        reader.seek(ContainerSeek::Start(offset))?;
        let mut vars = reader.reserve_records(count, VARIABLE_RECORD_LEN)?;
        for _ in 0..count {
            let raw = reader.read_fixed::<VARIABLE_RECORD_LEN>()?;
            vars.push(Self::decode(&mut FieldDecoder::new(&raw)));
        }
        Ok(vars)
    }
}

/// Named member layout referenced by struct descriptors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableSpace {
    vars: Vec<VariableRecord>,
}

impl VariableSpace {
    pub fn new(vars: Vec<VariableRecord>) -> Self {
        Self { vars }
    }

    pub fn vars(&self) -> &[VariableRecord] {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Reads the space directory at `offset`, then each space's member table.
    pub fn read_all<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Vec<VariableSpace>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        reader.seek(ContainerSeek::Start(offset))?;
        let mut directory: Vec<(u32, u32)> = reader.reserve_records(count, VARSPACE_RECORD_LEN)?;
        for _ in 0..count {
            let raw = reader.read_fixed::<VARSPACE_RECORD_LEN>()?;
            let mut dec = FieldDecoder::new(&raw);
            let nvars = dec.u32();
            let ovars = dec.u32();
            directory.push((nvars, ovars));
        }

        let mut spaces = try_vec(reader.phase(), directory.len())?;
        for (nvars, ovars) in directory {
            spaces.push(VariableSpace::new(VariableRecord::read_table(
                reader, ovars, nvars,
            )?));
        }
        Ok(spaces)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::container::error::{LoadError, LoadPhase};
    use crate::prog::types::descriptor::BaseType;

    fn encode_table(vars: &[VariableRecord]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut enc = FieldEncoder::new(&mut out);
        for var in vars {
            var.encode(&mut enc);
        }
        out
    }

    #[test]
    fn record_encoding_has_fixed_length() {
        let record = VariableRecord::new(1, 0, TypeDescriptor::scalar(BaseType::Int));
        let bytes = encode_table(&[record]);
        assert_eq!(bytes.len(), VARIABLE_RECORD_LEN);
    }

    #[test]
    fn table_reads_every_field() {
        let vars = vec![
            VariableRecord::new(10, 0, TypeDescriptor::scalar(BaseType::Int)),
            VariableRecord::new(11, 4, TypeDescriptor::structure(3)).in_space(2),
        ];
        let mut bytes = vec![0u8; 16];
        bytes.extend(encode_table(&vars));
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let read = VariableRecord::read_table(&mut reader, 16, 2).expect("read table");
        assert_eq!(read, vars, "ids, offsets, spaces and descriptors must survive");
    }

    #[test]
    fn oversized_count_is_truncation_not_allocation() {
        let mut reader = ContainerReader::open(Cursor::new(vec![0u8; 64]), 0).unwrap();
        reader.set_phase(LoadPhase::GlobalVars);
        let err = VariableRecord::read_table(&mut reader, 0, 1_000_000).unwrap_err();
        assert!(
            matches!(err, LoadError::Truncated { phase: LoadPhase::GlobalVars, .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn empty_spaces_read_no_members() {
        let mut bytes = Vec::new();
        FieldEncoder::new(&mut bytes).u32(0).u32(0);
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let spaces = VariableSpace::read_all(&mut reader, 0, 1).expect("read spaces");
        assert_eq!(spaces.len(), 1);
        assert!(spaces[0].is_empty(), "zero-member space stays empty");
    }
}
