//! Symbol tables a loaded module carries: identifier names and system-procedure bindings.

pub mod id_table;
pub mod sysproc;

pub use id_table::{IdEntry, IdTable, UNKNOWN_NAME};
pub use sysproc::{
    DispatchCode, HostProc, RelocationReport, SysProcBinding, SysProcReference, SysProcTable,
    UnresolvedSysProc, relocate,
};
