use std::{error::Error, fmt, io};

pub type LoadResult<T> = Result<T, LoadError>;

/// Linear sequence of steps a module load walks through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPhase {
    Header,
    ShapeTable,
    Strings,
    IncludedFiles,
    Imports,
    IdTable,
    GlobalVars,
    LocalVars,
    NamedVarSpaces,
    SourceListings,
    Procedures,
    Relocation,
    Ready,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadPhase::Header => "header",
            LoadPhase::ShapeTable => "procedure shape table",
            LoadPhase::Strings => "string pool",
            LoadPhase::IncludedFiles => "included files",
            LoadPhase::Imports => "imports",
            LoadPhase::IdTable => "id table",
            LoadPhase::GlobalVars => "global variables",
            LoadPhase::LocalVars => "local variables",
            LoadPhase::NamedVarSpaces => "variable spaces",
            LoadPhase::SourceListings => "source listings",
            LoadPhase::Procedures => "procedures",
            LoadPhase::Relocation => "sysproc relocation",
            LoadPhase::Ready => "ready",
        };
        f.write_str(label)
    }
}

/// Data block a layout failure was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataBlock {
    Globals,
    Locals,
    Private { procedure: usize },
    Public { procedure: usize },
}

impl fmt::Display for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataBlock::Globals => f.write_str("global data"),
            DataBlock::Locals => f.write_str("local data"),
            DataBlock::Private { procedure } => write!(f, "private data of procedure {procedure}"),
            DataBlock::Public { procedure } => write!(f, "public data of procedure {procedure}"),
        }
    }
}

/// Coarse classification callers use to decide how to react to a failed load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Io,
    Allocation,
}

#[derive(Debug)]
pub enum LoadError {
    Io {
        phase: LoadPhase,
        source: io::Error,
    },
    Truncated {
        phase: LoadPhase,
        offset: u64,
        len: u64,
        available: u64,
    },
    BadMagic {
        found: [u8; 8],
    },
    UnsupportedVersion {
        found: u32,
        minimum: u32,
    },
    UnknownTypeTag {
        tag: u8,
        link: usize,
    },
    UnterminatedDescriptor,
    DescriptorOverrun {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    BadStructRef {
        space: u32,
        available: usize,
    },
    StructTooDeep {
        depth: usize,
    },
    LayoutOverflow,
    LayoutTooComplex {
        budget: usize,
    },
    /// A layout failure, tagged with where the walked block came from.
    Layout {
        phase: LoadPhase,
        block: DataBlock,
        source: Box<LoadError>,
    },
    Malformed {
        phase: LoadPhase,
        reason: String,
    },
    Allocation {
        phase: LoadPhase,
        bytes: usize,
    },
}

impl LoadError {
    pub(crate) fn io(phase: LoadPhase, source: io::Error) -> Self {
        LoadError::Io { phase, source }
    }

    pub(crate) fn malformed(phase: LoadPhase, reason: impl Into<String>) -> Self {
        LoadError::Malformed {
            phase,
            reason: reason.into(),
        }
    }

    pub(crate) fn in_block(self, phase: LoadPhase, block: DataBlock) -> Self {
        LoadError::Layout {
            phase,
            block,
            source: Box::new(self),
        }
    }

    /// The underlying failure, looking through block context.
    pub fn root(&self) -> &LoadError {
        match self {
            LoadError::Layout { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Layout { source, .. } => source.kind(),
            LoadError::Io { .. } | LoadError::Truncated { .. } => ErrorKind::Io,
            LoadError::Allocation { .. } => ErrorKind::Allocation,
            _ => ErrorKind::Format,
        }
    }

    /// Phase the failure was raised in, when the error carries one.
    pub fn phase(&self) -> Option<LoadPhase> {
        match self {
            LoadError::Io { phase, .. }
            | LoadError::Truncated { phase, .. }
            | LoadError::Malformed { phase, .. }
            | LoadError::Layout { phase, .. }
            | LoadError::Allocation { phase, .. } => Some(*phase),
            LoadError::BadMagic { .. } | LoadError::UnsupportedVersion { .. } => {
                Some(LoadPhase::Header)
            }
            _ => None,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { phase, source } => {
                write!(f, "I/O error while reading {phase}: {source}")
            }
            LoadError::Truncated {
                phase,
                offset,
                len,
                available,
            } => write!(
                f,
                "{phase} needs {len} bytes at 0x{offset:08X} \
                 but the container holds only 0x{available:08X}"
            ),
            LoadError::BadMagic { found } => write!(f, "bad module magic {found:02X?}"),
            LoadError::UnsupportedVersion { found, minimum } => write!(
                f,
                "module version 0x{found:04X} is older than the minimum 0x{minimum:04X}"
            ),
            LoadError::UnknownTypeTag { tag, link } => {
                write!(f, "unknown type tag {tag} at descriptor link {link}")
            }
            LoadError::UnterminatedDescriptor => {
                write!(f, "type descriptor chain does not end in a scalar or struct")
            }
            LoadError::DescriptorOverrun {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "variable data at offset {offset} len {len} overruns its {capacity}-byte block"
            ),
            LoadError::BadStructRef { space, available } => write!(
                f,
                "struct refers to variable space {space} but only {available} exist"
            ),
            LoadError::StructTooDeep { depth } => {
                write!(f, "struct nesting exceeds {depth} levels")
            }
            LoadError::LayoutOverflow => write!(f, "variable layout size overflows"),
            LoadError::LayoutTooComplex { budget } => write!(
                f,
                "variable layout visits more than {budget} bytes of its block"
            ),
            LoadError::Layout {
                phase,
                block,
                source,
            } => write!(f, "{phase}: bad layout in {block}: {source}"),
            LoadError::Malformed { phase, reason } => write!(f, "malformed {phase}: {reason}"),
            LoadError::Allocation { phase, bytes } => {
                write!(f, "could not allocate {bytes} bytes for {phase}")
            }
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Layout { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
