//! Byte-level access to a compiled module container: the bounded reader,
//! field codecs, byte-order helpers, the header, and the reference encoder.

pub mod encoder;
pub mod endianness;
pub mod error;
pub mod fields;
pub mod header;
pub mod reader;

pub use encoder::{ModuleImage, ProcImage};
pub use endianness::{Endianness, FILE_ORDER};
pub use error::{DataBlock, ErrorKind, LoadError, LoadPhase, LoadResult};
pub use header::{CURRENT_VERSION, HEADER_LEN, MAGIC, MIN_VERSION, ModuleHeader};
pub use reader::{ContainerReader, ContainerSeek};
