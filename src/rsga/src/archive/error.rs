use std::ops::Range;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which digest a [`Error::ChecksumMismatch`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumKind {
    FileMd5,
    TocMd5,
    FileCrc32,
}

impl std::fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumKind::FileMd5 => write!(f, "file MD5"),
            ChecksumKind::TocMd5 => write!(f, "ToC MD5"),
            ChecksumKind::FileCrc32 => write!(f, "file CRC32"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid magic word: {found:02x?}")]
    InvalidMagic { found: [u8; 8] },

    #[error("unsupported archive version {major}.{minor}, expected 2.0")]
    VersionMismatch { major: u16, minor: u16 },

    #[error("file entries are {size} bytes each, expected 20 (Dawn of War) or 17 (Impossible Creatures)")]
    UndeterminedGameFormat { size: u64 },

    #[error("{kind} mismatch over bytes {}..{}: expected {expected:02x?}, got {actual:02x?}", .range.start, .range.end)]
    ChecksumMismatch {
        kind: ChecksumKind,
        expected: Vec<u8>,
        actual: Vec<u8>,
        range: Range<u64>,
    },

    #[error("field '{0}' is fixed in SGA v2 and cannot be written")]
    InvalidField(&'static str),

    #[error("name offset {0} does not start a string in the name buffer")]
    NameOffset(u32),

    #[error("file data range {start}..{end} escapes the data block")]
    DataRange { start: u64, end: u64 },

    #[error("storage type value {0} is not STORE, STREAM_COMPRESS or BUFFER_COMPRESS")]
    StorageType(u8),

    #[error("block '{0}' exceeds its wire capacity")]
    TableOverflow(&'static str),
}
