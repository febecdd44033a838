//! Error types for hostsync-profiles

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parse, validation or template failure reported by the domain model
    #[error(transparent)]
    Core(#[from] hostsync_core::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] hostsync_fs::Error),

    #[error("Malformed profile document {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot include '{reference}': {message}")]
    Include { reference: String, message: String },

    #[error("Includes nested deeper than {limit} levels at '{reference}'")]
    IncludeDepth { reference: String, limit: usize },

    #[error("Cannot download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Directory or file {path} does not exist")]
    SourceNotFound { path: PathBuf },
}

impl Error {
    /// Whether the failure lies in one document rather than in the source
    /// enumerating documents.
    pub fn is_document_error(&self) -> bool {
        !matches!(self, Self::SourceNotFound { .. } | Self::Fs(_))
    }
}
