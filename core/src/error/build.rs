//! Contains the error for building an index.

use std::error::Error;
use std::fmt;
use std::io;

/// Fatal errors from building an index.  Problems with individual lines are not errors, they are
/// skipped and counted in the build stats.
#[derive(Debug)]
pub enum BuildError {
    /// The record store could not be opened.
    RecordStoreOpen(io::Error),
    /// The index file could not be created or truncated.
    IndexCreate(io::Error),
    /// The record store has no lines at all (not even the column header line).
    EmptyRecordStore,
    /// Reading the column header line failed.
    ReadHeaderLine(io::Error),
    /// Error writing the index header.
    WriteIndexHeader(io::Error),
    /// Error writing the bucket table.
    WriteBucketTable(io::Error),
    /// Error syncing the finished index to disk.
    IndexSync(io::Error),
    /// Error moving the finished index over the index path.
    IndexRename(io::Error),
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RecordStoreOpen(e)
            | Self::IndexCreate(e)
            | Self::ReadHeaderLine(e)
            | Self::WriteIndexHeader(e)
            | Self::WriteBucketTable(e)
            | Self::IndexSync(e)
            | Self::IndexRename(e) => Some(e),
            Self::EmptyRecordStore => None,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::RecordStoreOpen(e) => write!(f, "open record store: {}", e),
            Self::IndexCreate(e) => write!(f, "create index: {}", e),
            Self::EmptyRecordStore => write!(f, "record store is empty (no header line)"),
            Self::ReadHeaderLine(e) => write!(f, "read header line: {}", e),
            Self::WriteIndexHeader(e) => write!(f, "write index header: {}", e),
            Self::WriteBucketTable(e) => write!(f, "write bucket table: {}", e),
            Self::IndexSync(e) => write!(f, "index sync: {}", e),
            Self::IndexRename(e) => write!(f, "index rename: {}", e),
        }
    }
}
