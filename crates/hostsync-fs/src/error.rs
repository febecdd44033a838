//! Error types for hostsync-fs

use std::path::PathBuf;

/// Result type for hostsync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hostsync-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Path {path} escapes base directory {base}")]
    PathEscapesBase { path: PathBuf, base: PathBuf },

    #[error("Invalid {what} '{value}': {reason}")]
    InvalidIdentifier {
        what: String,
        value: String,
        reason: String,
    },

    #[error("Invalid wildcard pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
