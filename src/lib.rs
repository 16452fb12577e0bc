//! Loader and linker for compiled DCB bytecode modules.
//!
//! A module is read from any seekable stream in one pass: its header,
//! symbol tables, variable layouts, and procedures are decoded, every data
//! block is converted to host byte order, and the module's system-procedure
//! references are bound against the host's native table. The result is an
//! owned [`Module`] that never exposes a partially linked state.

pub mod container;
pub mod loader;
pub mod module;
pub mod prog;

pub use container::{
    DataBlock, Endianness, ErrorKind, LoadError, LoadPhase, LoadResult, ModuleHeader, ModuleImage,
    ProcImage,
};
pub use loader::{LoadOptions, ModuleLoader};
pub use module::Module;
pub use prog::symbols::{DispatchCode, HostProc, SysProcTable, UnresolvedSysProc};
