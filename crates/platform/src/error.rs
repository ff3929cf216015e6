//! Error types for Skiff

use std::fmt;

/// Unified error type for all Skiff operations
#[derive(Debug)]
pub enum SkiffError {
    /// I/O error
    Io(std::io::Error),

    /// Protocol error (malformed frames, refused requests, setup failures)
    Protocol(String),

    /// A remote process exited with a non-zero status.
    ///
    /// The numeric code is carried in the variant so callers can extract it
    /// by matching instead of downcasting a generic error.
    Exit {
        /// Exit status reported by the remote process
        status: u32,
    },

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for SkiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkiffError::Io(e) => write!(f, "IO error: {}", e),
            SkiffError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            SkiffError::Exit { status } => {
                write!(f, "Remote process exited with status {}", status)
            }
            SkiffError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for SkiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SkiffError::Io(e) => Some(e),
            SkiffError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SkiffError {
    fn from(err: std::io::Error) -> Self {
        SkiffError::Io(err)
    }
}

impl SkiffError {
    /// Returns the remote exit status if this is an [`SkiffError::Exit`].
    pub fn exit_status(&self) -> Option<u32> {
        match self {
            SkiffError::Exit { status } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for Skiff operations
pub type SkiffResult<T> = Result<T, SkiffError>;
