//! System-procedure references and the relocation pass that binds them to the
//! host's native implementations.
//!
//! A module declares every native routine it calls by name code, return kind,
//! parameter count, and parameter-type signature. The host supplies a table of
//! what it actually implements. Binding is exact on all four fields. A reference
//! nobody binds stays unresolved and only fails when the interpreter calls it.

use std::{error::Error, fmt};
use std::io::{Read, Seek};

use smallvec::SmallVec;
use tracing::warn;

use crate::container::LoadResult;
use crate::container::fields::{FieldDecoder, FieldEncoder};
use crate::container::reader::{ContainerReader, ContainerSeek};

use super::id_table::IdTable;

pub const SYSPROC_RECORD_LEN: usize = 16;

/// Host-side handle the interpreter dispatches a native call through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DispatchCode(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysProcBinding {
    Unresolved,
    Bound(DispatchCode),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SysProcReference {
    pub name_code: u32,
    pub kind: u32,
    pub params: u32,
    /// Code the module's bytecode uses to name this call.
    pub call_code: u32,
    pub signature: SmallVec<[u8; 8]>,
    binding: SysProcBinding,
}

impl SysProcReference {
    pub fn new(name_code: u32, kind: u32, params: u32, call_code: u32, signature: &[u8]) -> Self {
        Self {
            name_code,
            kind,
            params,
            call_code,
            signature: SmallVec::from_slice(signature),
            binding: SysProcBinding::Unresolved,
        }
    }

    pub fn binding(&self) -> SysProcBinding {
        self.binding
    }

    pub fn dispatch(&self) -> Option<DispatchCode> {
        match self.binding {
            SysProcBinding::Bound(code) => Some(code),
            SysProcBinding::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.binding, SysProcBinding::Bound(_))
    }

    fn matches(&self, host: &HostProc, name_code: u32) -> bool {
        self.kind == host.kind
            && self.params == host.params
            && self.name_code == name_code
            && self.signature.as_slice() == host.signature.as_bytes()
    }

    pub fn read_table<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Vec<SysProcReference>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        reader.seek(ContainerSeek::Start(offset))?;
        let mut refs = reader.reserve_records(count, SYSPROC_RECORD_LEN)?;
        for _ in 0..count {
            let raw = reader.read_fixed::<SYSPROC_RECORD_LEN>()?;
            let mut dec = FieldDecoder::new(&raw);
            let name_code = dec.u32();
            let kind = dec.u32();
            let params = dec.u32();
            let call_code = dec.u32();
            let signature = reader.read_bytes(params as usize)?;
            refs.push(Self::new(name_code, kind, params, call_code, &signature));
        }
        Ok(refs)
    }

    pub(crate) fn encode(&self, enc: &mut FieldEncoder<'_>) {
        enc.u32(self.name_code)
            .u32(self.kind)
            .u32(self.params)
            .u32(self.call_code)
            .bytes(&self.signature);
    }
}

/// One native routine the host implements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostProc {
    pub name: String,
    pub kind: u32,
    pub params: u32,
    pub signature: String,
    pub dispatch: DispatchCode,
}

impl HostProc {
    pub fn new(
        name: impl Into<String>,
        kind: u32,
        params: u32,
        signature: impl Into<String>,
        dispatch: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            params,
            signature: signature.into(),
            dispatch: DispatchCode(dispatch),
        }
    }
}

/// Host capability table, populated before any module is loaded.
#[derive(Clone, Debug, Default)]
pub struct SysProcTable {
    procs: Vec<HostProc>,
}

impl SysProcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, proc: HostProc) -> Self {
        self.procs.push(proc);
        self
    }

    pub fn procs(&self) -> &[HostProc] {
        &self.procs
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub resolved: usize,
    pub unresolved: usize,
}

/// Binds module references to host entries.
///
/// The host table drives the outer loop: each host entry binds the first
/// module reference that matches it exactly. When two references differ only
/// in name, which one a host entry reaches first depends on the host table
/// order, not the file order. A reference that is already bound keeps its
/// first binding.
pub fn relocate(
    refs: &mut [SysProcReference],
    host: &SysProcTable,
    ids: &IdTable,
) -> RelocationReport {
    for proc in host.procs() {
        let Some(name_code) = ids.code_for(&proc.name) else {
            continue;
        };
        let Some(target) = refs.iter_mut().find(|r| r.matches(proc, name_code)) else {
            continue;
        };
        let current = target.binding;
        match current {
            SysProcBinding::Unresolved => target.binding = SysProcBinding::Bound(proc.dispatch),
            SysProcBinding::Bound(existing) => warn!(
                name = %proc.name,
                existing = existing.0,
                ignored = proc.dispatch.0,
                "host table binds the same sysproc twice"
            ),
        }
    }
    let resolved = refs.iter().filter(|r| r.is_resolved()).count();
    RelocationReport {
        resolved,
        unresolved: refs.len() - resolved,
    }
}

/// Raised when the interpreter calls a sysproc no host entry was bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedSysProc {
    pub call_code: u32,
    pub name: String,
}

impl fmt::Display for UnresolvedSysProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "system procedure '{}' (call code {}) is not implemented by this host",
            self.name, self.call_code
        )
    }
}

impl Error for UnresolvedSysProc {}
