//! Type descriptors and the walker that sizes and normalizes the data they describe.

pub mod descriptor;
pub mod walker;

pub use descriptor::{BaseType, MAX_TYPECHUNKS, STRING_INDEX_WIDTH, TypeDescriptor};
pub use walker::{MAX_STRUCT_DEPTH, PayloadFixer, PayloadPass, ScalarVisitor, TypeWalker};
