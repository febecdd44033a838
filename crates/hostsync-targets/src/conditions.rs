//! Built-in conditions gating a target on local paths

use async_trait::async_trait;
use hostsync_core::{Condition, Result, TokenResolver, ValidationErrors, check_cancelled};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::guards::{PathKind, first_missing};

/// Satisfied when every path in `files` is an existing file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckFilesExistence {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Satisfied when every path in `directories` is an existing directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckDirectoriesExistence {
    #[serde(default)]
    pub directories: Vec<String>,
}

fn all_exist(paths: &[String], kind: PathKind, cancel: &CancellationToken) -> Result<bool> {
    check_cancelled(cancel)?;
    match first_missing(paths, kind) {
        Some(missing) => {
            tracing::debug!(path = missing, "Condition not satisfied");
            Ok(false)
        }
        None => Ok(true),
    }
}

#[async_trait]
impl Condition for CheckFilesExistence {
    fn type_name(&self) -> &'static str {
        "check-files-existence"
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.required_list("files", &self.files);
        errors
    }

    fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()> {
        tokens.resolve_all(&mut self.files)
    }

    async fn is_satisfied(&self, cancel: &CancellationToken) -> Result<bool> {
        all_exist(&self.files, PathKind::File, cancel)
    }
}

#[async_trait]
impl Condition for CheckDirectoriesExistence {
    fn type_name(&self) -> &'static str {
        "check-directories-existence"
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.required_list("directories", &self.directories);
        errors
    }

    fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()> {
        tokens.resolve_all(&mut self.directories)
    }

    async fn is_satisfied(&self, cancel: &CancellationToken) -> Result<bool> {
        all_exist(&self.directories, PathKind::Directory, cancel)
    }
}
