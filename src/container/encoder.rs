//! Reference encoder that lays out a complete container from in-memory parts.
//!
//! Offline tools and the test suites use it to produce modules the loader
//! accepts. Sections are written back to back after a header placeholder and
//! the procedure shape table comes last, so every offset is known when the
//! header is finally written.

use crate::prog::procedure::ProcedureShape;
use crate::prog::symbols::{IdTable, SysProcReference};
use crate::prog::vars::VariableRecord;

use super::fields::FieldEncoder;
use super::header::{CURRENT_VERSION, HEADER_LEN, ModuleHeader};

/// One procedure's payload. Data blocks are stored in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcImage {
    pub id: u32,
    pub flags: u32,
    pub params: u32,
    pub private_data: Vec<u8>,
    pub private_vars: Vec<VariableRecord>,
    pub private_strings: Vec<u32>,
    pub public_data: Vec<u8>,
    pub public_vars: Vec<VariableRecord>,
    pub public_strings: Vec<u32>,
    pub code: Vec<u32>,
    pub exit_offset: u32,
    pub error_offset: u32,
}

impl ProcImage {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_params(mut self, params: u32) -> Self {
        self.params = params;
        self
    }

    pub fn with_code(mut self, code: &[u32]) -> Self {
        self.code = code.to_vec();
        self
    }

    pub fn with_handlers(mut self, exit_offset: u32, error_offset: u32) -> Self {
        self.exit_offset = exit_offset;
        self.error_offset = error_offset;
        self
    }

    pub fn with_private(mut self, data: &[u8], vars: Vec<VariableRecord>) -> Self {
        self.private_data = data.to_vec();
        self.private_vars = vars;
        self
    }

    pub fn with_public(mut self, data: &[u8], vars: Vec<VariableRecord>) -> Self {
        self.public_data = data.to_vec();
        self.public_vars = vars;
        self
    }

    pub fn with_strings(mut self, private: &[u32], public: &[u32]) -> Self {
        self.private_strings = private.to_vec();
        self.public_strings = public.to_vec();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleImage {
    pub version: u32,
    pub ids: Vec<(u32, String)>,
    pub strings: Vec<String>,
    /// Bundled files as (name, contents).
    pub files: Vec<(String, Vec<u8>)>,
    pub imports: Vec<u32>,
    pub global_data: Vec<u8>,
    pub global_vars: Vec<VariableRecord>,
    pub local_data: Vec<u8>,
    pub local_vars: Vec<VariableRecord>,
    pub local_strings: Vec<u32>,
    pub varspaces: Vec<Vec<VariableRecord>>,
    pub source_files: Vec<String>,
    pub sysprocs: Vec<SysProcReference>,
    pub procs: Vec<ProcImage>,
}

impl Default for ModuleImage {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            ids: Vec::new(),
            strings: Vec::new(),
            files: Vec::new(),
            imports: Vec::new(),
            global_data: Vec::new(),
            global_vars: Vec::new(),
            local_data: Vec::new(),
            local_vars: Vec::new(),
            local_strings: Vec::new(),
            varspaces: Vec::new(),
            source_files: Vec::new(),
            sysprocs: Vec::new(),
            procs: Vec::new(),
        }
    }
}

impl ModuleImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, code: u32, name: impl Into<String>) -> Self {
        self.ids.push((code, name.into()));
        self
    }

    pub fn string(mut self, text: impl Into<String>) -> Self {
        self.strings.push(text.into());
        self
    }

    pub fn file(mut self, name: impl Into<String>, contents: &[u8]) -> Self {
        self.files.push((name.into(), contents.to_vec()));
        self
    }

    pub fn import(mut self, value: u32) -> Self {
        self.imports.push(value);
        self
    }

    pub fn globals(mut self, data: &[u8], vars: Vec<VariableRecord>) -> Self {
        self.global_data = data.to_vec();
        self.global_vars = vars;
        self
    }

    pub fn locals(mut self, data: &[u8], vars: Vec<VariableRecord>) -> Self {
        self.local_data = data.to_vec();
        self.local_vars = vars;
        self
    }

    pub fn local_strings(mut self, indexes: &[u32]) -> Self {
        self.local_strings = indexes.to_vec();
        self
    }

    pub fn varspace(mut self, members: Vec<VariableRecord>) -> Self {
        self.varspaces.push(members);
        self
    }

    pub fn source_file(mut self, path: impl Into<String>) -> Self {
        self.source_files.push(path.into());
        self
    }

    pub fn sysproc(mut self, reference: SysProcReference) -> Self {
        self.sysprocs.push(reference);
        self
    }

    pub fn proc(mut self, proc: ProcImage) -> Self {
        self.procs.push(proc);
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        self.encode_with_header().1
    }

    /// Lays out the container and returns it with the header it starts with.
    pub fn encode_with_header(&self) -> (ModuleHeader, Vec<u8>) {
        let mut out = vec![0u8; HEADER_LEN];
        let mut header = ModuleHeader {
            version: self.version,
            proc_count: count(self.procs.len()),
            file_count: count(self.files.len()),
            id_count: count(self.ids.len()),
            string_count: count(self.strings.len()),
            local_var_count: count(self.local_vars.len()),
            local_string_count: count(self.local_strings.len()),
            global_var_count: count(self.global_vars.len()),
            varspace_count: count(self.varspaces.len()),
            import_count: count(self.imports.len()),
            source_file_count: count(self.source_files.len()),
            sysproc_count: count(self.sysprocs.len()),
            global_size: count(self.global_data.len()),
            local_size: count(self.local_data.len()),
            ..ModuleHeader::default()
        };

        header.ids_offset = here(&out);
        for (code, name) in &self.ids {
            IdTable::encode_entry(*code, name, &mut FieldEncoder::new(&mut out));
        }

        let mut text = Vec::new();
        let mut starts = Vec::with_capacity(self.strings.len());
        for s in &self.strings {
            starts.push(count(text.len()));
            text.extend_from_slice(s.as_bytes());
            text.push(0);
        }
        header.strings_offset = here(&out);
        write_words(&mut out, &starts);
        header.text_offset = here(&out);
        header.text_size = count(text.len());
        out.extend_from_slice(&text);

        let mut file_offsets = Vec::with_capacity(self.files.len());
        for (_, contents) in &self.files {
            file_offsets.push(here(&out));
            out.extend_from_slice(contents);
        }
        header.files_offset = here(&out);
        for ((name, contents), at) in self.files.iter().zip(file_offsets) {
            FieldEncoder::new(&mut out)
                .u32(count(name.len() + 1))
                .u32(count(contents.len()))
                .u32(at)
                .bytes(name.as_bytes())
                .bytes(&[0]);
        }

        header.imports_offset = here(&out);
        write_words(&mut out, &self.imports);

        header.global_offset = here(&out);
        out.extend_from_slice(&self.global_data);
        header.global_vars_offset = write_vars(&mut out, &self.global_vars);
        header.local_offset = here(&out);
        out.extend_from_slice(&self.local_data);
        header.local_vars_offset = write_vars(&mut out, &self.local_vars);
        header.local_strings_offset = here(&out);
        write_words(&mut out, &self.local_strings);

        let member_tables: Vec<u32> = self
            .varspaces
            .iter()
            .map(|members| write_vars(&mut out, members))
            .collect();
        header.varspaces_offset = here(&out);
        for (members, at) in self.varspaces.iter().zip(member_tables) {
            FieldEncoder::new(&mut out).u32(count(members.len())).u32(at);
        }

        header.source_files_offset = here(&out);
        for path in &self.source_files {
            FieldEncoder::new(&mut out)
                .u32(count(path.len() + 1))
                .bytes(path.as_bytes())
                .bytes(&[0]);
        }

        header.sysprocs_offset = here(&out);
        for reference in &self.sysprocs {
            reference.encode(&mut FieldEncoder::new(&mut out));
        }

        let shapes: Vec<ProcedureShape> = self
            .procs
            .iter()
            .map(|proc| write_proc(&mut out, proc))
            .collect();
        header.procs_offset = here(&out);
        for shape in &shapes {
            shape.encode(&mut FieldEncoder::new(&mut out));
        }

        let mut head = Vec::with_capacity(HEADER_LEN);
        header.encode(&mut FieldEncoder::new(&mut head));
        out[..HEADER_LEN].copy_from_slice(&head);
        (header, out)
    }
}

fn write_proc(out: &mut Vec<u8>, proc: &ProcImage) -> ProcedureShape {
    let private_offset = here(out);
    out.extend_from_slice(&proc.private_data);
    let public_offset = here(out);
    out.extend_from_slice(&proc.public_data);
    let code_offset = here(out);
    write_words(out, &proc.code);
    let private_strings_offset = here(out);
    write_words(out, &proc.private_strings);
    let public_strings_offset = here(out);
    write_words(out, &proc.public_strings);
    let private_vars_offset = write_vars(out, &proc.private_vars);
    let public_vars_offset = write_vars(out, &proc.public_vars);

    ProcedureShape {
        id: proc.id,
        flags: proc.flags,
        params: proc.params,
        private_var_count: count(proc.private_vars.len()),
        private_string_count: count(proc.private_strings.len()),
        public_var_count: count(proc.public_vars.len()),
        public_string_count: count(proc.public_strings.len()),
        sentence_count: 0,
        private_size: count(proc.private_data.len()),
        public_size: count(proc.public_data.len()),
        code_size: count(proc.code.len() * 4),
        exit_offset: proc.exit_offset,
        error_offset: proc.error_offset,
        sentences_offset: 0,
        private_vars_offset,
        private_strings_offset,
        private_offset,
        public_vars_offset,
        public_strings_offset,
        public_offset,
        code_offset,
    }
}

fn write_vars(out: &mut Vec<u8>, vars: &[VariableRecord]) -> u32 {
    let at = here(out);
    let mut enc = FieldEncoder::new(out);
    for var in vars {
        var.encode(&mut enc);
    }
    at
}

fn write_words(out: &mut Vec<u8>, words: &[u32]) {
    let mut enc = FieldEncoder::new(out);
    for word in words {
        enc.u32(*word);
    }
}

fn here(out: &[u8]) -> u32 {
    count(out.len())
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::container::header::MIN_VERSION;
    use crate::container::reader::ContainerReader;

    #[test]
    fn empty_image_is_just_a_header() {
        let (header, bytes) = ModuleImage::new().encode_with_header();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(header.procs_offset, HEADER_LEN as u32);
    }

    #[test]
    fn header_written_matches_header_returned() {
        let image = ModuleImage::new()
            .id(1, "MAIN")
            .string("hello")
            .import(0xDEAD)
            .globals(&[0; 8], Vec::new())
            .proc(ProcImage::new(1).with_code(&[1, 2, 3]));
        let (header, bytes) = image.encode_with_header();
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let decoded = ModuleHeader::read_from(&mut reader, MIN_VERSION).expect("read header");
        assert_eq!(decoded, header);
        assert_eq!(decoded.text_size, 6, "one string plus its NUL");
        assert_eq!(decoded.global_size, 8);
    }
}
