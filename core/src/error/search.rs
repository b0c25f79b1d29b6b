//! Contains the error for searching an index.

use crate::error::build::BuildError;
use crate::error::LoadHeaderError;
use std::error::Error;
use std::fmt;
use std::io;

/// Errors that stop a search before any bucket is probed.  Unreadable buckets or entries during
/// the probe are skipped, not reported here.
#[derive(Debug)]
pub enum SearchError {
    /// The index was missing and building it failed.
    Build(BuildError),
    /// The index file could not be opened.
    IndexOpen(io::Error),
    /// The index header could not be read or validated.
    IndexHeader(LoadHeaderError),
    /// The record store could not be opened.
    RecordStoreOpen(io::Error),
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Build(e) => Some(e),
            Self::IndexOpen(e) | Self::RecordStoreOpen(e) => Some(e),
            Self::IndexHeader(e) => Some(e),
        }
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::Build(e) => write!(f, "build: {}", e),
            Self::IndexOpen(e) => write!(f, "open index: {}", e),
            Self::IndexHeader(e) => write!(f, "index header: {}", e),
            Self::RecordStoreOpen(e) => write!(f, "open record store: {}", e),
        }
    }
}

impl From<BuildError> for SearchError {
    fn from(err: BuildError) -> Self {
        Self::Build(err)
    }
}
