//! Guard targets that stop a profile when expected paths are missing
//!
//! Placed before other targets, a guard keeps a profile from exporting or
//! importing on hosts where the synchronized application is not installed.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostsync_core::{
    Result, Setting, SyncContext, Target, TokenResolver, ValidationErrors, check_cancelled,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// What a guard expects to find at each listed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathKind {
    File,
    Directory,
}

impl PathKind {
    pub(crate) fn exists(self, path: &Path) -> bool {
        match self {
            Self::File => path.is_file(),
            Self::Directory => path.is_dir(),
        }
    }
}

/// First listed path that does not exist as `kind`.
pub(crate) fn first_missing<'a>(paths: &'a [String], kind: PathKind) -> Option<&'a str> {
    paths
        .iter()
        .map(String::as_str)
        .find(|p| !kind.exists(Path::new(p)))
}

fn check(
    type_name: &str,
    paths: &[String],
    kind: PathKind,
    context: &SyncContext,
    cancel: &CancellationToken,
) -> Result<bool> {
    check_cancelled(cancel)?;
    match first_missing(paths, kind) {
        Some(missing) => {
            tracing::info!(guard = type_name, path = missing, "Path missing, stopping processing");
            context.cancel_processing();
            Ok(false)
        }
        None => Ok(true),
    }
}

macro_rules! guard_target {
    ($name:ident, $type_name:literal, $field:ident, $kind:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Default, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub struct $name {
            #[serde(default)]
            pub $field: Vec<String>,
        }

        impl $name {
            pub fn new($field: Vec<String>) -> Self {
                Self { $field }
            }
        }

        #[async_trait]
        impl Target for $name {
            fn type_name(&self) -> &'static str {
                $type_name
            }

            fn validate(&self) -> ValidationErrors {
                let mut errors = ValidationErrors::new();
                errors.required_list(stringify!($field), &self.$field);
                errors
            }

            fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()> {
                tokens.resolve_all(&mut self.$field)
            }

            async fn export(
                &self,
                context: &SyncContext,
                cancel: &CancellationToken,
            ) -> Result<Vec<Setting>> {
                check($type_name, &self.$field, $kind, context, cancel)?;
                Ok(vec![Setting::empty()])
            }

            async fn import(
                &self,
                context: &SyncContext,
                _settings: Vec<Setting>,
                cancel: &CancellationToken,
            ) -> Result<()> {
                check($type_name, &self.$field, $kind, context, cancel)?;
                Ok(())
            }

            async fn last_update(
                &self,
                context: &SyncContext,
                cancel: &CancellationToken,
            ) -> Result<Option<DateTime<Utc>>> {
                check($type_name, &self.$field, $kind, context, cancel)?;
                Ok(None)
            }
        }
    };
}

guard_target!(
    StopIfFilesNotExist,
    "stop-if-files-not-exist",
    files,
    PathKind::File,
    "Stops processing of the profile when any of `files` is missing."
);

guard_target!(
    StopIfDirectoriesNotExist,
    "stop-if-directories-not-exist",
    directories,
    PathKind::Directory,
    "Stops processing of the profile when any of `directories` is missing."
);
