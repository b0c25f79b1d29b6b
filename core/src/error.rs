//! Implements the errors for building and searching an index.

pub mod build;
pub mod search;

use std::error::Error;
use std::fmt;
use std::io;

/// Error on loading an index file header.
#[derive(Debug)]
pub enum LoadHeaderError {
    /// The type string for the header was invalid- corrupted or incorrect file type.
    InvalidType,
    /// The file was written by an unsupported format version.
    InvalidVersion(u16),
    /// The header crc32 did not match, the header is corrupt.
    CrcFailed,
    /// The index was built with a different key hasher than the one in use.
    InvalidHasher,
    /// The header offsets do not describe a valid bucket table/entry region layout.
    InvalidLayout,
    /// An underlying IO error while loading the header
    IO(io::Error),
}

impl Error for LoadHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IO(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for LoadHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::InvalidType => write!(f, "invalid type id"),
            Self::InvalidVersion(version) => write!(f, "unsupported index version {}", version),
            Self::CrcFailed => write!(f, "header crc32 mismatch"),
            Self::InvalidHasher => write!(f, "index built with a different hasher"),
            Self::InvalidLayout => write!(f, "invalid bucket table layout"),
            Self::IO(e) => write!(f, "io: {}", e),
        }
    }
}

impl From<io::Error> for LoadHeaderError {
    fn from(io_err: io::Error) -> Self {
        Self::IO(io_err)
    }
}
