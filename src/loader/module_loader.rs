//! Single-pass pipeline that reads a container, normalizes its payloads,
//! binds its system procedures, and hands back a finished [`Module`].

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, info};

use crate::container::header::ModuleHeader;
use crate::container::reader::{ContainerReader, ContainerSeek, try_vec};
use crate::container::{DataBlock, LoadError, LoadPhase, LoadResult};
use crate::module::Module;
use crate::prog::files::EmbeddedFile;
use crate::prog::procedure::{Procedure, ProcedureShape};
use crate::prog::source::{FsSourceProvider, SourceListing, SourceProvider};
use crate::prog::strings::StringPool;
use crate::prog::symbols::{IdTable, SysProcReference, SysProcTable, relocate};
use crate::prog::types::TypeWalker;
use crate::prog::vars::{VariableRecord, VariableSpace};

use super::options::LoadOptions;

pub struct ModuleLoader {
    options: LoadOptions,
    sources: Box<dyn SourceProvider>,
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl ModuleLoader {
    pub fn new(options: LoadOptions) -> Self {
        let sources: Box<dyn SourceProvider> = match &options.source_root {
            Some(root) => Box::new(FsSourceProvider::rooted(root.clone())),
            None => Box::new(FsSourceProvider::new()),
        };
        Self { options, sources }
    }

    pub fn with_source_provider(mut self, provider: impl SourceProvider + 'static) -> Self {
        self.sources = Box::new(provider);
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn load_path(&self, path: impl AsRef<Path>, host: &SysProcTable) -> LoadResult<Module> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| LoadError::io(LoadPhase::Header, err))?;
        debug!(path = %path.display(), "opened module file");
        self.load(BufReader::new(file), 0, host)
    }

    /// Loads the module that starts `base_offset` bytes into `source`.
    ///
    /// Any failure discards everything read so far; no partial module escapes.
    pub fn load<R: Read + Seek>(
        &self,
        source: R,
        base_offset: u64,
        host: &SysProcTable,
    ) -> LoadResult<Module> {
        let mut reader = ContainerReader::open(source, base_offset)?;
        let header = ModuleHeader::read_from(&mut reader, self.options.min_version)?;
        debug!(
            version = header.version,
            procs = header.proc_count,
            base_offset,
            "module header accepted"
        );
        let pass = self.options.payload_pass();

        enter(&mut reader, LoadPhase::ShapeTable, header.proc_count);
        let shapes =
            ProcedureShape::read_table(&mut reader, header.procs_offset, header.proc_count)?;

        enter(&mut reader, LoadPhase::Strings, header.string_count);
        let strings = StringPool::read_from(
            &mut reader,
            header.strings_offset,
            header.string_count,
            header.text_offset,
            header.text_size,
        )?;

        enter(&mut reader, LoadPhase::IncludedFiles, header.file_count);
        let files = EmbeddedFile::read_table(&mut reader, header.files_offset, header.file_count)?;

        enter(&mut reader, LoadPhase::Imports, header.import_count);
        let imports = read_words(&mut reader, header.imports_offset, header.import_count)?;

        enter(&mut reader, LoadPhase::IdTable, header.id_count);
        let ids = IdTable::read_from(&mut reader, header.ids_offset, header.id_count)?;

        enter(&mut reader, LoadPhase::GlobalVars, header.global_var_count);
        let mut global_data = read_data(&mut reader, header.global_offset, header.global_size)?;
        let global_vars = VariableRecord::read_table(
            &mut reader,
            header.global_vars_offset,
            header.global_var_count,
        )?;

        enter(&mut reader, LoadPhase::LocalVars, header.local_var_count);
        let mut local_data = read_data(&mut reader, header.local_offset, header.local_size)?;
        let local_vars = VariableRecord::read_table(
            &mut reader,
            header.local_vars_offset,
            header.local_var_count,
        )?;
        let local_strings = read_words(
            &mut reader,
            header.local_strings_offset,
            header.local_string_count,
        )?;

        enter(&mut reader, LoadPhase::NamedVarSpaces, header.varspace_count);
        let varspaces =
            VariableSpace::read_all(&mut reader, header.varspaces_offset, header.varspace_count)?;
        let walker = TypeWalker::new(&varspaces);
        walker.apply(
            &mut global_data,
            &global_vars,
            pass,
            LoadPhase::GlobalVars,
            DataBlock::Globals,
        )?;
        walker.apply(
            &mut local_data,
            &local_vars,
            pass,
            LoadPhase::LocalVars,
            DataBlock::Locals,
        )?;
        debug!(
            ?pass,
            global = global_data.len(),
            local = local_data.len(),
            "data blocks normalized"
        );

        enter(&mut reader, LoadPhase::SourceListings, header.source_file_count);
        let source_listings = self.load_sources(&mut reader, &header)?;

        enter(&mut reader, LoadPhase::Procedures, header.proc_count);
        let mut procedures = try_vec(reader.phase(), shapes.len())?;
        for (index, shape) in shapes.iter().enumerate() {
            procedures.push(Procedure::load(&mut reader, index, shape, &ids, &walker, pass)?);
        }

        enter(&mut reader, LoadPhase::Relocation, header.sysproc_count);
        let mut sysprocs = SysProcReference::read_table(
            &mut reader,
            header.sysprocs_offset,
            header.sysproc_count,
        )?;
        let report = relocate(&mut sysprocs, host, &ids);
        debug!(resolved = report.resolved, unresolved = report.unresolved, "sysprocs relocated");

        reader.set_phase(LoadPhase::Ready);
        let by_name = Module::index_procedures(&procedures);
        let entry_point = by_name.get(self.options.entry_point.as_str()).copied();
        let sysproc_by_call = Module::index_sysprocs(&sysprocs);
        info!(
            procs = procedures.len(),
            entry_point = entry_point.is_some(),
            resolved = report.resolved,
            unresolved = report.unresolved,
            "module ready"
        );

        Ok(Module {
            header,
            procedures,
            by_name,
            entry_point,
            global_data: global_data.into_boxed_slice(),
            local_data: local_data.into_boxed_slice(),
            global_vars,
            local_vars,
            local_strings,
            varspaces,
            ids,
            strings,
            files,
            imports,
            source_listings,
            sysprocs,
            sysproc_by_call,
        })
    }

    fn load_sources<R: Read + Seek>(
        &self,
        reader: &mut ContainerReader<R>,
        header: &ModuleHeader,
    ) -> LoadResult<Vec<SourceListing>> {
        let paths = SourceListing::read_paths(
            reader,
            header.source_files_offset,
            header.source_file_count,
        )?;
        if !self.options.load_sources {
            return Ok(paths.into_iter().map(SourceListing::missing).collect());
        }
        Ok(paths
            .iter()
            .map(|path| SourceListing::fetch(path, self.sources.as_ref()))
            .collect())
    }
}

fn enter<R>(reader: &mut ContainerReader<R>, phase: LoadPhase, count: u32)
where
    R: Read + Seek,
{
    reader.set_phase(phase);
    debug!(%phase, count, "entering load phase");
}

fn read_words<R: Read + Seek>(
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

fn read_data<R: Read + Seek>(
    reader: &mut ContainerReader<R>,
    offset: u32,
    size: u32,
) -> LoadResult<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    reader.seek(ContainerSeek::Start(offset))?;
    reader.read_bytes(size as usize)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::container::encoder::{ModuleImage, ProcImage};
    use crate::container::ErrorKind;
    use crate::prog::symbols::{DispatchCode, HostProc};

    fn sample() -> Vec<u8> {
        ModuleImage::new()
            .id(1, "MAIN")
            .id(2, "HELPER")
            .id(3, "SAY")
            .proc(ProcImage::new(1).with_code(&[0x10, 0x20]))
            .proc(ProcImage::new(2))
            .sysproc(SysProcReference::new(3, 1, 2, 40, b"II"))
            .encode()
    }

    #[test]
    fn loads_procedures_and_entry_point() {
        let host = SysProcTable::new().with(HostProc::new("SAY", 1, 2, "II", 7));
        let module = ModuleLoader::default()
            .load(Cursor::new(sample()), 0, &host)
            .expect("load module");
        assert_eq!(module.procedures().len(), 2);
        assert_eq!(module.entry_point().map(|p| p.index), Some(0));
        assert!(module.procedure_by_name("HELPER").expect("helper").is_abstract());
        assert_eq!(module.resolve_sysproc(40), Ok(DispatchCode(7)));
    }

    #[test]
    fn custom_entry_point_name() {
        let loader = ModuleLoader::new(LoadOptions::new().with_entry_point("HELPER"));
        let module = loader.load(Cursor::new(sample()), 0, &SysProcTable::new()).unwrap();
        assert_eq!(module.entry_point().map(|p| p.name.as_str()), Some("HELPER"));
    }

    #[test]
    fn truncated_shape_table_names_its_phase() {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - 10);
        let err = ModuleLoader::default()
            .load(Cursor::new(bytes), 0, &SysProcTable::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.phase(), Some(LoadPhase::ShapeTable));
    }
}
