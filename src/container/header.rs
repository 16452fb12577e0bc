//! Fixed-size module header: magic, version, section counts, block sizes, and
//! section offsets relative to the module base.

use std::io::{Read, Seek};

use super::error::{LoadError, LoadPhase, LoadResult};
use super::fields::{FieldDecoder, FieldEncoder};
use super::reader::{ContainerReader, ContainerSeek};

pub const MAGIC: [u8; 8] = *b"dcb\r\n\x1f\0\0";
pub const HEADER_LEN: usize = 124;
pub const MIN_VERSION: u32 = 0x0700;
pub const CURRENT_VERSION: u32 = 0x0710;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleHeader {
    pub version: u32,

    pub proc_count: u32,
    pub file_count: u32,
    pub id_count: u32,
    pub string_count: u32,
    pub local_var_count: u32,
    pub local_string_count: u32,
    pub global_var_count: u32,
    pub varspace_count: u32,
    pub import_count: u32,
    pub source_file_count: u32,
    pub sysproc_count: u32,

    pub global_size: u32,
    pub local_size: u32,
    pub text_size: u32,

    pub procs_offset: u32,
    pub ids_offset: u32,
    pub strings_offset: u32,
    pub text_offset: u32,
    pub global_offset: u32,
    pub global_vars_offset: u32,
    pub local_offset: u32,
    pub local_vars_offset: u32,
    pub local_strings_offset: u32,
    pub varspaces_offset: u32,
    pub files_offset: u32,
    pub imports_offset: u32,
    pub source_files_offset: u32,
    pub sysprocs_offset: u32,
}

impl ModuleHeader {
    /// Seeks to the module base and decodes the header.
    ///
    /// The header is read into a stack buffer, so a bad magic or an old
    /// version is rejected without any heap allocation.
    pub fn read_from<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        min_version: u32,
    ) -> LoadResult<Self> {
        reader.set_phase(LoadPhase::Header);
        reader.seek(ContainerSeek::Start(0))?;
        let raw = reader.read_fixed::<HEADER_LEN>()?;
        let mut dec = FieldDecoder::new(&raw);
        let magic = dec.array::<8>();
        let header = Self::decode_fields(&mut dec);
        if magic != MAGIC {
            return Err(LoadError::BadMagic { found: magic });
        }
        if header.version < min_version {
            return Err(LoadError::UnsupportedVersion {
                found: header.version,
                minimum: min_version,
            });
        }
        Ok(header)
    }

    fn decode_fields(dec: &mut FieldDecoder<'_>) -> Self {
        Self {
            version: dec.u32(),
            proc_count: dec.u32(),
            file_count: dec.u32(),
            id_count: dec.u32(),
            string_count: dec.u32(),
            local_var_count: dec.u32(),
            local_string_count: dec.u32(),
            global_var_count: dec.u32(),
            varspace_count: dec.u32(),
            import_count: dec.u32(),
            source_file_count: dec.u32(),
            sysproc_count: dec.u32(),
            global_size: dec.u32(),
            local_size: dec.u32(),
            text_size: dec.u32(),
            procs_offset: dec.u32(),
            ids_offset: dec.u32(),
            strings_offset: dec.u32(),
            text_offset: dec.u32(),
            global_offset: dec.u32(),
            global_vars_offset: dec.u32(),
            local_offset: dec.u32(),
            local_vars_offset: dec.u32(),
            local_strings_offset: dec.u32(),
            varspaces_offset: dec.u32(),
            files_offset: dec.u32(),
            imports_offset: dec.u32(),
            source_files_offset: dec.u32(),
            sysprocs_offset: dec.u32(),
        }
    }

    pub fn encode(&self, enc: &mut FieldEncoder<'_>) {
        enc.bytes(&MAGIC)
            .u32(self.version)
            .u32(self.proc_count)
            .u32(self.file_count)
            .u32(self.id_count)
            .u32(self.string_count)
            .u32(self.local_var_count)
            .u32(self.local_string_count)
            .u32(self.global_var_count)
            .u32(self.varspace_count)
            .u32(self.import_count)
            .u32(self.source_file_count)
            .u32(self.sysproc_count)
            .u32(self.global_size)
            .u32(self.local_size)
            .u32(self.text_size)
            .u32(self.procs_offset)
            .u32(self.ids_offset)
            .u32(self.strings_offset)
            .u32(self.text_offset)
            .u32(self.global_offset)
            .u32(self.global_vars_offset)
            .u32(self.local_offset)
            .u32(self.local_vars_offset)
            .u32(self.local_strings_offset)
            .u32(self.varspaces_offset)
            .u32(self.files_offset)
            .u32(self.imports_offset)
            .u32(self.source_files_offset)
            .u32(self.sysprocs_offset);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::container::error::ErrorKind;

    fn sample() -> ModuleHeader {
        ModuleHeader {
            version: CURRENT_VERSION,
            proc_count: 3,
            id_count: 9,
            global_size: 64,
            local_size: 16,
            text_size: 40,
            procs_offset: 0x200,
            sysprocs_offset: 0x400,
            ..ModuleHeader::default()
        }
    }

    fn encode(header: &ModuleHeader) -> Vec<u8> {
        let mut out = Vec::new();
        header.encode(&mut FieldEncoder::new(&mut out));
        out
    }

    #[test]
    fn encoded_header_has_fixed_length() {
        assert_eq!(encode(&sample()).len(), HEADER_LEN);
    }

    #[test]
    fn header_round_trips() {
        let header = sample();
        let mut reader = ContainerReader::open(Cursor::new(encode(&header)), 0).unwrap();
        let decoded = ModuleHeader::read_from(&mut reader, MIN_VERSION).expect("decode header");
        assert_eq!(decoded, header, "every count, size and offset must survive");
    }

    #[test]
    fn corrupted_magic_is_a_format_error() {
        let mut bytes = encode(&sample());
        bytes[0] = b'x';
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let err = ModuleHeader::read_from(&mut reader, MIN_VERSION).unwrap_err();
        assert!(matches!(err, LoadError::BadMagic { .. }), "got {err:?}");
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn old_versions_are_rejected() {
        let header = ModuleHeader {
            version: 0x0600,
            ..sample()
        };
        let mut reader = ContainerReader::open(Cursor::new(encode(&header)), 0).unwrap();
        let err = ModuleHeader::read_from(&mut reader, MIN_VERSION).unwrap_err();
        assert!(
            matches!(err, LoadError::UnsupportedVersion { found: 0x0600, minimum: MIN_VERSION }),
            "got {err:?}"
        );
    }

    #[test]
    fn short_header_is_an_io_error() {
        let bytes = encode(&sample())[..HEADER_LEN - 1].to_vec();
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let err = ModuleHeader::read_from(&mut reader, MIN_VERSION).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
