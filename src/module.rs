//! A fully loaded and linked module.
//!
//! Instances are only produced by the loader once every phase has succeeded,
//! so nothing reachable from here is ever partially linked.

use ahash::AHashMap;

use crate::container::header::ModuleHeader;
use crate::prog::files::EmbeddedFile;
use crate::prog::procedure::Procedure;
use crate::prog::source::SourceListing;
use crate::prog::strings::StringPool;
use crate::prog::symbols::{
    DispatchCode, IdTable, SysProcBinding, SysProcReference, UNKNOWN_NAME, UnresolvedSysProc,
};
use crate::prog::types::TypeWalker;
use crate::prog::vars::{VariableRecord, VariableSpace};

#[derive(Debug)]
pub struct Module {
    pub(crate) header: ModuleHeader,
    pub(crate) procedures: Vec<Procedure>,
    pub(crate) by_name: AHashMap<String, usize>,
    pub(crate) entry_point: Option<usize>,
    pub(crate) global_data: Box<[u8]>,
    pub(crate) local_data: Box<[u8]>,
    pub(crate) global_vars: Vec<VariableRecord>,
    pub(crate) local_vars: Vec<VariableRecord>,
    pub(crate) local_strings: Vec<u32>,
    pub(crate) varspaces: Vec<VariableSpace>,
    pub(crate) ids: IdTable,
    pub(crate) strings: StringPool,
    pub(crate) files: Vec<EmbeddedFile>,
    pub(crate) imports: Vec<u32>,
    pub(crate) source_listings: Vec<SourceListing>,
    pub(crate) sysprocs: Vec<SysProcReference>,
    pub(crate) sysproc_by_call: AHashMap<u32, usize>,
}

impl Module {
    pub(crate) fn index_procedures(procedures: &[Procedure]) -> AHashMap<String, usize> {
        let mut by_name = AHashMap::with_capacity(procedures.len());
        for proc in procedures {
            by_name.entry(proc.name.clone()).or_insert(proc.index);
        }
        by_name
    }

    pub(crate) fn index_sysprocs(sysprocs: &[SysProcReference]) -> AHashMap<u32, usize> {
        let mut by_call = AHashMap::with_capacity(sysprocs.len());
        for (index, reference) in sysprocs.iter().enumerate() {
            by_call.entry(reference.call_code).or_insert(index);
        }
        by_call
    }

    pub fn header(&self) -> &ModuleHeader {
        &self.header
    }

    pub fn procedure(&self, index: usize) -> Option<&Procedure> {
        self.procedures.get(index)
    }

    /// First procedure carrying `name`.
    pub fn procedure_by_name(&self, name: &str) -> Option<&Procedure> {
        self.by_name.get(name).and_then(|index| self.procedures.get(*index))
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn entry_point(&self) -> Option<&Procedure> {
        self.entry_point.and_then(|index| self.procedures.get(index))
    }

    pub fn global_size(&self) -> usize {
        self.global_data.len()
    }

    pub fn local_size(&self) -> usize {
        self.local_data.len()
    }

    /// Global data block, already in host order.
    pub fn global_data(&self) -> &[u8] {
        &self.global_data
    }

    /// Template every process instance copies its locals from.
    pub fn local_data(&self) -> &[u8] {
        &self.local_data
    }

    pub fn global_vars(&self) -> &[VariableRecord] {
        &self.global_vars
    }

    pub fn local_vars(&self) -> &[VariableRecord] {
        &self.local_vars
    }

    pub fn local_strings(&self) -> &[u32] {
        &self.local_strings
    }

    pub fn varspace(&self, index: usize) -> Option<&VariableSpace> {
        self.varspaces.get(index)
    }

    pub fn varspaces(&self) -> &[VariableSpace] {
        &self.varspaces
    }

    /// Walker bound to this module's struct layouts.
    pub fn layout(&self) -> TypeWalker<'_> {
        TypeWalker::new(&self.varspaces)
    }

    pub fn ids(&self) -> &IdTable {
        &self.ids
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn files(&self) -> &[EmbeddedFile] {
        &self.files
    }

    pub fn imports(&self) -> &[u32] {
        &self.imports
    }

    pub fn source_listings(&self) -> &[SourceListing] {
        &self.source_listings
    }

    /// Line `line` (from 1) of source file `file`, for backtraces.
    pub fn source_line(&self, file: usize, line: usize) -> Option<&str> {
        self.source_listings.get(file)?.line(line)
    }

    pub fn sysprocs(&self) -> &[SysProcReference] {
        &self.sysprocs
    }

    /// Looks up the native routine behind `call_code` at call time.
    pub fn resolve_sysproc(&self, call_code: u32) -> Result<DispatchCode, UnresolvedSysProc> {
        let Some(reference) = self
            .sysproc_by_call
            .get(&call_code)
            .and_then(|index| self.sysprocs.get(*index))
        else {
            return Err(UnresolvedSysProc {
                call_code,
                name: UNKNOWN_NAME.to_string(),
            });
        };
        match reference.binding() {
            SysProcBinding::Bound(code) => Ok(code),
            SysProcBinding::Unresolved => Err(UnresolvedSysProc {
                call_code,
                name: self.ids.name_for(reference.name_code).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn modules_can_cross_threads() {
        assert_send_sync::<Module>();
    }
}
