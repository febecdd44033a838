//! The `files` target: a set of files below a base path

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostsync_core::setting::{KEY_LAST_UPDATE, KEY_NAME};
use hostsync_core::time::{from_system_time, to_ticks};
use hostsync_core::{
    DEFAULT_POLL_INTERVAL, Error, Monitor, PollMonitor, Result, Setting, SyncContext, Target,
    TargetEvent, TokenResolver, ValidationErrors, check_cancelled,
};
use hostsync_fs::io::{modified, set_modified, write_atomic_from};
use hostsync_fs::join_within;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::file_set::FileSet;

pub const TYPE_NAME: &str = "files";

/// Synchronizes the files selected by `files` below `base-path`.
///
/// Each file becomes one setting named after its path relative to
/// `base-path`. Import writes the files back under `base-path` and restores
/// their modification times; the newest modification time is the target's
/// last update.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FilesTarget {
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub skip_if_not_exists: bool,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(skip)]
    monitor: OnceLock<PollMonitor<TargetEvent>>,
}

impl FilesTarget {
    pub fn new(base_path: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            base_path: base_path.into(),
            files,
            ..Self::default()
        }
    }

    pub fn skip_if_not_exists(mut self, skip: bool) -> Self {
        self.skip_if_not_exists = skip;
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    fn file_set(&self) -> Result<FileSet> {
        FileSet::new(
            TYPE_NAME,
            &self.base_path,
            &self.files,
            self.skip_if_not_exists,
            &self.exclude_patterns,
        )
    }
}

fn stamp(path: &Path) -> Result<DateTime<Utc>> {
    Ok(from_system_time(modified(path)?))
}

#[async_trait]
impl Target for FilesTarget {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.required("base-path", &self.base_path);
        if !self.base_path.is_empty() && !Path::new(&self.base_path).is_absolute() {
            errors.add("base-path", "must be a rooted path");
        }
        errors.required_list("files", &self.files);
        for pattern in &self.exclude_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.add("exclude-patterns", format!("invalid pattern '{pattern}': {e}"));
            }
        }
        errors
    }

    fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()> {
        tokens.resolve_in_place(&mut self.base_path)?;
        tokens.resolve_all(&mut self.files)?;
        tokens.resolve_all(&mut self.exclude_patterns)
    }

    async fn export(&self, _context: &SyncContext, cancel: &CancellationToken) -> Result<Vec<Setting>> {
        let set = self.file_set()?;
        let mut settings = Vec::new();
        for path in set.resolve()? {
            check_cancelled(cancel)?;
            let name = set.relative_name(&path)?;
            let updated = to_ticks(stamp(&path)?);
            tracing::debug!(file = %path.display(), %name, "Exporting file");
            settings.push(
                Setting::from_file(path)
                    .with_metadata(KEY_NAME, name)
                    .with_metadata(KEY_LAST_UPDATE, updated.to_string()),
            );
        }
        if settings.is_empty() {
            settings.push(Setting::empty());
        }
        Ok(settings)
    }

    async fn import(
        &self,
        _context: &SyncContext,
        settings: Vec<Setting>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let base = PathBuf::from(&self.base_path);
        for setting in settings {
            check_cancelled(cancel)?;
            let name = setting
                .metadata(KEY_NAME)
                .ok_or_else(|| Error::target(TYPE_NAME, "setting has no file name"))?;
            let destination = join_within(&base, name)?;
            let mut reader = setting.content.open()?;
            write_atomic_from(&destination, &mut reader)?;
            if let Some(updated) = setting.last_update()? {
                set_modified(&destination, SystemTime::from(updated))?;
            }
            tracing::debug!(file = %destination.display(), "Imported file");
        }
        Ok(())
    }

    async fn last_update(
        &self,
        _context: &SyncContext,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut latest: Option<DateTime<Utc>> = None;
        for path in self.file_set()?.resolve()? {
            check_cancelled(cancel)?;
            let updated = stamp(&path)?;
            latest = Some(latest.map_or(updated, |l| l.max(updated)));
        }
        Ok(latest)
    }

    fn monitor(&self) -> Option<&dyn Monitor<TargetEvent>> {
        let monitor = self.monitor.get_or_init(|| {
            let set = self.file_set().ok();
            PollMonitor::new(
                format!("files:{}", self.base_path),
                DEFAULT_POLL_INTERVAL,
                move || {
                    let files = set
                        .as_ref()
                        .and_then(|s| s.resolve().ok())
                        .unwrap_or_default();
                    hostsync_fs::watch::scan_paths(files)
                },
                |events| {
                    vec![TargetEvent {
                        paths: events.into_iter().map(|e| e.path).collect(),
                    }]
                },
            )
        });
        Some(monitor)
    }
}
