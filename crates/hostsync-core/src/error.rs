//! Error types for hostsync-core

use crate::validation::ValidationErrors;

/// Result type for hostsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of element created through the [`ElementRegistry`](crate::ElementRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Target,
    Condition,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target => write!(f, "target"),
            Self::Condition => write!(f, "condition"),
        }
    }
}

/// Errors that can occur in hostsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or unusable user configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed profile markup
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// A `type` tag with no registered implementation
    #[error("Unknown {kind} type '{type_name}'")]
    UnknownType {
        kind: ElementKind,
        type_name: String,
    },

    /// A profile without a `targets` sequence
    #[error("Profile '{profile}' does not declare a targets list")]
    MissingTargets { profile: String },

    /// Declared field constraints violated
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Template token that cannot be resolved
    #[error("Cannot resolve template '{token}': {reason}")]
    Template { token: String, reason: String },

    /// Operation attempted in the wrong open mode
    #[error("Bundle {bundle} is not opened in {expected} mode")]
    BundleMode {
        bundle: String,
        expected: &'static str,
    },

    /// Expected archive entry is missing
    #[error("Entry '{entry}' not found in bundle {bundle}")]
    EntryNotFound { bundle: String, entry: String },

    /// Archive content is inconsistent
    #[error("Bundle {bundle} is corrupted: {message}")]
    BundleIntegrity { bundle: String, message: String },

    /// No bundle with the given id exists
    #[error("Bundle not found: {id}")]
    BundleNotFound { id: String },

    /// Low-level archive failure
    #[error("Archive error in bundle {bundle}: {message}")]
    Archive { bundle: String, message: String },

    /// Target-specific runtime failure
    #[error("Target '{target}' failed: {message}")]
    Target { target: String, message: String },

    /// Monitor could not be started
    #[error("Monitor error: {message}")]
    Monitor { message: String },

    /// Cancellation was requested
    #[error("Operation cancelled")]
    Cancelled,

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from hostsync-fs
    #[error(transparent)]
    Fs(#[from] hostsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML deserialization error
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn target(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Target {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Return [`Error::Cancelled`] when `token` has been triggered.
pub fn check_cancelled(token: &tokio_util::sync::CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
