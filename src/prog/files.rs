//! Descriptors for files bundled inside the container.
//!
//! The loader only records where each file lives; registering them with a
//! virtual file table is up to the host.

use std::io::{Read, Seek};

use crate::container::LoadResult;
use crate::container::fields::FieldDecoder;
use crate::container::reader::{ContainerReader, ContainerSeek, try_vec};

pub const FILE_RECORD_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub name: String,
    /// Absolute offset in the underlying stream, base offset included.
    pub offset: u64,
    pub size: u32,
}

impl EmbeddedFile {
    pub fn read_table<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Vec<EmbeddedFile>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        reader.seek(ContainerSeek::Start(offset))?;
        reader.ensure_available(count as u64 * FILE_RECORD_LEN as u64)?;
        let mut files = try_vec(reader.phase(), count as usize)?;
        for _ in 0..count {
            let raw = reader.read_fixed::<FILE_RECORD_LEN>()?;
            let mut dec = FieldDecoder::new(&raw);
            let name_len = dec.u32();
            let size = dec.u32();
            let file_offset = dec.u32();
            let name = reader.read_name(name_len as usize)?;
            files.push(EmbeddedFile {
                name,
                offset: reader.base_offset() + file_offset as u64,
                size,
            });
        }
        Ok(files)
    }
}
