//! Procedure shape records and the per-procedure payload loader.

use std::io::{Read, Seek};

use bitflags::bitflags;

use crate::container::fields::{FieldDecoder, FieldEncoder};
use crate::container::reader::{ContainerReader, ContainerSeek};
use crate::container::{DataBlock, LoadError, LoadResult};

use super::symbols::IdTable;
use super::types::{PayloadPass, TypeWalker};
use super::vars::VariableRecord;

pub const SHAPE_RECORD_LEN: usize = 84;
pub const CODE_WORD_LEN: u32 = 4;

bitflags! {
    #[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Hash)]
    pub struct ProcFlags: u32 {
        const FRAME    = 0b1;
        const LOCALS   = 0b10;
        const FUNCTION = 0b100;
        const PUBLICS  = 0b1000;
    }
}

/// Fixed-size table entry describing where each part of a procedure lives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcedureShape {
    pub id: u32,
    pub flags: u32,
    pub params: u32,
    pub private_var_count: u32,
    pub private_string_count: u32,
    pub public_var_count: u32,
    pub public_string_count: u32,
    pub sentence_count: u32,
    pub private_size: u32,
    pub public_size: u32,
    pub code_size: u32,
    pub exit_offset: u32,
    pub error_offset: u32,
    pub sentences_offset: u32,
    pub private_vars_offset: u32,
    pub private_strings_offset: u32,
    pub private_offset: u32,
    pub public_vars_offset: u32,
    pub public_strings_offset: u32,
    pub public_offset: u32,
    pub code_offset: u32,
}

impl ProcedureShape {
    pub(crate) fn decode(dec: &mut FieldDecoder<'_>) -> Self {
        Self {
            id: dec.u32(),
            flags: dec.u32(),
            params: dec.u32(),
            private_var_count: dec.u32(),
            private_string_count: dec.u32(),
            public_var_count: dec.u32(),
            public_string_count: dec.u32(),
            sentence_count: dec.u32(),
            private_size: dec.u32(),
            public_size: dec.u32(),
            code_size: dec.u32(),
            exit_offset: dec.u32(),
            error_offset: dec.u32(),
            sentences_offset: dec.u32(),
            private_vars_offset: dec.u32(),
            private_strings_offset: dec.u32(),
            private_offset: dec.u32(),
            public_vars_offset: dec.u32(),
            public_strings_offset: dec.u32(),
            public_offset: dec.u32(),
            code_offset: dec.u32(),
        }
    }

    pub(crate) fn encode(&self, enc: &mut FieldEncoder<'_>) {
        enc.u32(self.id)
            .u32(self.flags)
            .u32(self.params)
            .u32(self.private_var_count)
            .u32(self.private_string_count)
            .u32(self.public_var_count)
            .u32(self.public_string_count)
            .u32(self.sentence_count)
            .u32(self.private_size)
            .u32(self.public_size)
            .u32(self.code_size)
            .u32(self.exit_offset)
            .u32(self.error_offset)
            .u32(self.sentences_offset)
            .u32(self.private_vars_offset)
            .u32(self.private_strings_offset)
            .u32(self.private_offset)
            .u32(self.public_vars_offset)
            .u32(self.public_strings_offset)
            .u32(self.public_offset)
            .u32(self.code_offset);
    }

    /// Reads the whole shape table before any payload is touched.
    pub fn read_table<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Vec<ProcedureShape>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        reader.seek(ContainerSeek::Start(offset))?;
        let mut shapes = reader.reserve_records(count, SHAPE_RECORD_LEN)?;
        for _ in 0..count {
            let raw = reader.read_fixed::<SHAPE_RECORD_LEN>()?;
            shapes.push(Self::decode(&mut FieldDecoder::new(&raw)));
        }
        Ok(shapes)
    }
}

/// A loaded procedure. Missing blocks stay `None` instead of empty allocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Procedure {
    pub index: usize,
    pub id: u32,
    pub name: String,
    pub flags: ProcFlags,
    pub params: u32,
    pub sentence_count: u32,
    pub private_data: Option<Box<[u8]>>,
    pub public_data: Option<Box<[u8]>>,
    pub code: Option<Box<[u32]>>,
    pub private_strings: Vec<u32>,
    pub public_strings: Vec<u32>,
    pub private_vars: Vec<VariableRecord>,
    pub public_vars: Vec<VariableRecord>,
    /// Code offset of the ONEXIT handler.
    pub exit_offset: Option<u32>,
    /// Code offset of the ONERROR handler.
    pub error_offset: Option<u32>,
}

impl Procedure {
    /// Declared but bodyless.
    pub fn is_abstract(&self) -> bool {
        self.code.is_none()
    }

    pub fn is_function(&self) -> bool {
        self.flags.contains(ProcFlags::FUNCTION)
    }

    pub fn private_size(&self) -> usize {
        self.private_data.as_ref().map_or(0, |data| data.len())
    }

    pub fn public_size(&self) -> usize {
        self.public_data.as_ref().map_or(0, |data| data.len())
    }

    pub fn load<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        index: usize,
        shape: &ProcedureShape,
        ids: &IdTable,
        walker: &TypeWalker<'_>,
        pass: PayloadPass,
    ) -> LoadResult<Procedure> {
        let mut private_data = read_block(reader, shape.private_offset, shape.private_size)?;
        let mut public_data = read_block(reader, shape.public_offset, shape.public_size)?;

        if shape.code_size % CODE_WORD_LEN != 0 {
            return Err(LoadError::malformed(
                reader.phase(),
                format!(
                    "procedure {index} code size {} is not a whole number of words",
                    shape.code_size
                ),
            ));
        }
        let code = match shape.code_size {
            0 => None,
            size => {
                reader.seek(ContainerSeek::Start(shape.code_offset))?;
                Some(
                    reader
                        .read_u32_array((size / CODE_WORD_LEN) as usize)?
                        .into_boxed_slice(),
                )
            }
        };
        let (exit_offset, error_offset) = match code {
            Some(_) => (nonzero(shape.exit_offset), nonzero(shape.error_offset)),
            None => (None, None),
        };

        let private_strings =
            read_indexes(reader, shape.private_strings_offset, shape.private_string_count)?;
        let public_strings =
            read_indexes(reader, shape.public_strings_offset, shape.public_string_count)?;
        let private_vars =
            VariableRecord::read_table(reader, shape.private_vars_offset, shape.private_var_count)?;
        let public_vars =
            VariableRecord::read_table(reader, shape.public_vars_offset, shape.public_var_count)?;

        walker.apply(
            private_data.as_deref_mut().unwrap_or_default(),
            &private_vars,
            pass,
            reader.phase(),
            DataBlock::Private { procedure: index },
        )?;
        walker.apply(
            public_data.as_deref_mut().unwrap_or_default(),
            &public_vars,
            pass,
            reader.phase(),
            DataBlock::Public { procedure: index },
        )?;

        Ok(Procedure {
            index,
            id: shape.id,
            name: ids.name_for(shape.id).to_owned(),
            flags: ProcFlags::from_bits_retain(shape.flags),
            params: shape.params,
            sentence_count: shape.sentence_count,
            private_data,
            public_data,
            code,
            private_strings,
            public_strings,
            private_vars,
            public_vars,
            exit_offset,
            error_offset,
        })
    }
}

fn nonzero(value: u32) -> Option<u32> {
    (value != 0).then_some(value)
}

fn read_block<R: Read + Seek>(
    reader: &mut ContainerReader<R>,
    offset: u32,
    size: u32,
) -> LoadResult<Option<Box<[u8]>>> {
    if size == 0 {
        return Ok(None);
    }
    reader.seek(ContainerSeek::Start(offset))?;
    Ok(Some(reader.read_bytes(size as usize)?.into_boxed_slice()))
}

fn read_indexes<R: Read + Seek>(
    reader: &mut ContainerReader<R>,
    offset: u32,
    count: u32,
) -> LoadResult<Vec<u32>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    reader.seek(ContainerSeek::Start(offset))?;
    reader.read_u32_array(count as usize)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::prog::types::{BaseType, TypeDescriptor};

    fn reader_over(bytes: Vec<u8>) -> ContainerReader<Cursor<Vec<u8>>> {
        ContainerReader::open(Cursor::new(bytes), 0).unwrap()
    }

    #[test]
    fn shape_record_has_fixed_length() {
        let mut bytes = Vec::new();
        ProcedureShape::default().encode(&mut FieldEncoder::new(&mut bytes));
        assert_eq!(bytes.len(), SHAPE_RECORD_LEN);
    }

    #[test]
    fn bodyless_procedure_has_no_code_or_handlers() {
        let shape = ProcedureShape {
            id: 3,
            exit_offset: 12,
            flags: 0x104,
            ..Default::default()
        };
        let mut ids = IdTable::new();
        ids.push(3, "DRAW");
        let mut reader = reader_over(vec![0; 4]);
        let walker = TypeWalker::new(&[]);
        let proc = Procedure::load(&mut reader, 0, &shape, &ids, &walker, PayloadPass::Check)
            .expect("abstract procedures load");
        assert!(proc.is_abstract());
        assert_eq!(proc.exit_offset, None, "handlers need a body");
        assert_eq!(proc.private_data, None, "zero-size blocks are not allocated");
        assert!(proc.is_function());
        assert_eq!(proc.flags.bits(), 0x104, "unknown flag bits are retained");
        assert_eq!(proc.name, "DRAW");
    }

    #[test]
    fn unknown_id_gets_the_placeholder_name() {
        let mut reader = reader_over(vec![0; 4]);
        let proc = Procedure::load(
            &mut reader,
            5,
            &ProcedureShape { id: 77, ..Default::default() },
            &IdTable::new(),
            &TypeWalker::new(&[]),
            PayloadPass::Skip,
        )
        .unwrap();
        assert_eq!(proc.name, "(?)");
        assert_eq!(proc.index, 5);
    }

    #[test]
    fn ragged_code_size_is_malformed() {
        let shape = ProcedureShape {
            code_size: 6,
            ..Default::default()
        };
        let mut reader = reader_over(vec![0; 8]);
        let (ids, walker) = (IdTable::new(), TypeWalker::new(&[]));
        let err = Procedure::load(&mut reader, 0, &shape, &ids, &walker, PayloadPass::Skip)
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }), "got {err:?}");
    }

    #[test]
    fn private_data_is_swapped_per_variable_table() {
        // private block: one dword at 0, then the variable record describing it
        let mut bytes = Vec::new();
        {
            let mut enc = FieldEncoder::new(&mut bytes);
            enc.bytes(&[1, 2, 3, 4]).u32(0xAABB_CCDD).u32(0x1122_3344);
            VariableRecord::new(9, 0, TypeDescriptor::scalar(BaseType::Dword)).encode(&mut enc);
        }
        let shape = ProcedureShape {
            private_size: 4,
            private_offset: 0,
            code_size: 8,
            code_offset: 4,
            exit_offset: 4,
            private_var_count: 1,
            private_vars_offset: 12,
            ..Default::default()
        };
        let mut reader = reader_over(bytes);
        let (ids, walker) = (IdTable::new(), TypeWalker::new(&[]));
        let proc = Procedure::load(&mut reader, 0, &shape, &ids, &walker, PayloadPass::Swap)
            .expect("load procedure");
        assert_eq!(proc.private_data.as_deref(), Some(&[4u8, 3, 2, 1][..]));
        assert_eq!(proc.code.as_deref(), Some(&[0xAABB_CCDD, 0x1122_3344][..]));
        assert_eq!(proc.exit_offset, Some(4));
        assert_eq!(proc.error_offset, None);
        assert_eq!(proc.private_vars.len(), 1);
    }
}
