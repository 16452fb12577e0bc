//! Module loading pipeline and its options.

pub mod module_loader;
pub mod options;

pub use module_loader::ModuleLoader;
pub use options::{DEFAULT_ENTRY_POINT, LoadOptions};
