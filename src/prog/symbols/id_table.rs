//! Bidirectional identifier table mapping name codes to names and back.

use std::io::{Read, Seek};

use ahash::AHashMap;

use crate::container::LoadResult;
use crate::container::fields::{FieldDecoder, FieldEncoder, fixed_name};
use crate::container::reader::{ContainerReader, ContainerSeek};

pub const ID_NAME_LEN: usize = 64;
pub const ID_RECORD_LEN: usize = ID_NAME_LEN + 4;

/// Name reported for a code the table does not know.
pub const UNKNOWN_NAME: &str = "(?)";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdEntry {
    pub code: u32,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct IdTable {
    entries: Vec<IdEntry>,
    by_code: AHashMap<u32, usize>,
    by_name: AHashMap<String, u32>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Lookups keep resolving to the first entry that used
    /// a given code or name.
    pub fn push<S: Into<String>>(&mut self, code: u32, name: S) {
        let name = name.into();
        let index = self.entries.len();
        self.by_code.entry(code).or_insert(index);
        self.by_name.entry(name.clone()).or_insert(code);
        self.entries.push(IdEntry { code, name });
    }

    pub fn name_for(&self, code: u32) -> &str {
        self.by_code
            .get(&code)
            .map(|index| self.entries[*index].name.as_str())
            .unwrap_or(UNKNOWN_NAME)
    }

    pub fn code_for(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdEntry> {
        self.entries.iter()
    }

    pub fn read_from<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Self> {
        let mut table = Self::new();
        if count == 0 {
            return Ok(table);
        }
        reader.seek(ContainerSeek::Start(offset))?;
        table.entries = reader.reserve_records(count, ID_RECORD_LEN)?;
        for _ in 0..count {
            let raw = reader.read_fixed::<ID_RECORD_LEN>()?;
            let mut dec = FieldDecoder::new(&raw);
            let name = fixed_name(&dec.array::<ID_NAME_LEN>());
            let code = dec.u32();
            table.push(code, name);
        }
        Ok(table)
    }

    pub(crate) fn encode_entry(code: u32, name: &str, enc: &mut FieldEncoder<'_>) {
        enc.padded(name.as_bytes(), ID_NAME_LEN - 1).padded(&[], 1).u32(code);
    }
}
