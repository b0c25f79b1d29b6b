//! Errors from the search service.

use std::error::Error;
use std::fmt;
use titledx_core::error::build::BuildError;

/// Error from opening the service or an async rebuild().
#[derive(Debug)]
pub enum ServiceError {
    /// Building the index failed.
    Build(BuildError),
    /// The channel to the rebuild thread has closed (the service is unusable for rebuilds).
    SendChannelClosed,
    /// Failed to receive a response from the rebuild thread, the index is in an unknown state.
    ReceiveFailed,
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Build(e) => Some(e),
            Self::SendChannelClosed | Self::ReceiveFailed => None,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::Build(e) => write!(f, "build: {}", e),
            Self::SendChannelClosed => write!(f, "send channel closed"),
            Self::ReceiveFailed => write!(f, "receive failed"),
        }
    }
}

impl From<BuildError> for ServiceError {
    fn from(err: BuildError) -> Self {
        Self::Build(err)
    }
}
