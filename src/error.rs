//! Everything that can go wrong while pulling the ring buffer out of a vmcore. None of
//! these are recoverable: the vmcore is a point-in-time snapshot so retrying won't help.
use crate::elf::{Bytes, Offset, VirtualAddr};
use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum DumpError {
    /// Open, stat, or read failed (or a read would have gone past the end of the file).
    Io {
        path: PathBuf,
        action: String,
        source: io::Error,
    },

    /// The ELF header isn't for a 64-bit little-endian x86-64 core file.
    InvalidFormat(String),

    /// A program header (or the program header table) points outside the file.
    CorruptSegment {
        kind: &'static str,
        obytes: Bytes<Offset>,
        file_size: u64,
    },

    /// A note record doesn't fit within the NOTE segment.
    CorruptNote { offset: Offset, reason: String },

    /// There is no segment (or note) that satisfies the lookup.
    MissingSegment {
        kind: &'static str,
        vbytes: Option<Bytes<VirtualAddr>>,
    },

    /// The VMCOREINFO key is absent (or its value is zero or empty).
    SymbolNotFound(String),

    /// VMCOREINFO is larger than we are willing to buffer.
    TooLarge { size: u64, max: usize },

    /// The ring buffer counters are inconsistent.
    ReconstructionFailed(String),
}

impl DumpError {
    pub fn io(path: impl Into<PathBuf>, action: impl Into<String>, source: io::Error) -> Self {
        DumpError::Io {
            path: path.into(),
            action: action.into(),
            source,
        }
    }
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Io {
                path,
                action,
                source,
            } => write!(f, "{action} {}: {source}", path.display()),
            DumpError::InvalidFormat(reason) => write!(f, "not a vmcore: {reason}"),
            DumpError::CorruptSegment {
                kind,
                obytes,
                file_size,
            } => write!(
                f,
                "{kind} at {} with size 0x{:x} extends past the end of the file (0x{file_size:x} bytes)",
                obytes.start, obytes.size
            ),
            DumpError::CorruptNote { offset, reason } => {
                write!(f, "bad note at {offset}: {reason}")
            }
            DumpError::MissingSegment { kind, vbytes } => match vbytes {
                Some(vbytes) => write!(
                    f,
                    "no {kind} segment contains {} with size 0x{:x}",
                    vbytes.start, vbytes.size
                ),
                None => write!(f, "{kind} not found"),
            },
            DumpError::SymbolNotFound(key) => write!(f, "{key} not found in VMCOREINFO"),
            DumpError::TooLarge { size, max } => write!(
                f,
                "VMCOREINFO is 0x{size:x} bytes but at most 0x{max:x} bytes are supported"
            ),
            DumpError::ReconstructionFailed(reason) => {
                write!(f, "can't reconstruct ring buffer: {reason}")
            }
        }
    }
}

impl Error for DumpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DumpError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
