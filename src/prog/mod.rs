//! In-memory program model built from a container: procedures, variables,
//! types, symbols, constant strings, embedded files, and source listings.

pub mod files;
pub mod procedure;
pub mod source;
pub mod strings;
pub mod symbols;
pub mod types;
pub mod vars;

pub use files::EmbeddedFile;
pub use procedure::{ProcFlags, Procedure, ProcedureShape};
pub use source::{FsSourceProvider, SourceListing, SourceProvider};
pub use strings::StringPool;
pub use vars::{VariableRecord, VariableSpace};
