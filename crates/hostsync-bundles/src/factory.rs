//! Bundle storage in a shared directory

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostsync_core::{
    Bundle, BundleEvent, BundleFactory, BundleInfo, DEFAULT_POLL_INTERVAL, Error, Monitor,
    PollMonitor, Result, check_cancelled, format_bundle_id, parse_bundle_id,
};
use hostsync_fs::{FsEventKind, validate_path_identifier};
use tokio_util::sync::CancellationToken;

use crate::zip_bundle::ZipBundle;

/// File extension of bundle archives.
pub const BUNDLE_EXTENSION: &str = "zip";

/// Stores each bundle as `<profile>@<timestamp>.zip` in one directory.
///
/// The directory is created on the first write. Hidden files and files
/// whose names do not parse as bundle ids are ignored.
#[derive(Debug)]
pub struct ZipBundleFactory {
    directory: PathBuf,
    monitor: PollMonitor<BundleEvent>,
}

impl ZipBundleFactory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_poll_interval(directory, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(directory: impl Into<PathBuf>, interval: Duration) -> Self {
        let directory = directory.into();
        let scan_dir = directory.clone();
        let monitor = PollMonitor::new(
            format!("bundles:{}", directory.display()),
            interval,
            move || hostsync_fs::watch::scan_dir(&scan_dir, false),
            |events| {
                events
                    .into_iter()
                    .filter(|e| e.kind != FsEventKind::Removed)
                    .filter_map(|e| {
                        let bundle_id = bundle_id_of(&e.path)?;
                        let (profile_id, _) = parse_bundle_id(&bundle_id)?;
                        Some(BundleEvent {
                            profile_id: profile_id.to_string(),
                            bundle_id: bundle_id.clone(),
                        })
                    })
                    .collect()
            },
        );
        Self { directory, monitor }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Location of the archive for bundle `id`.
    pub fn path_of(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}.{BUNDLE_EXTENSION}"))
    }

    fn list(&self, profile_id: &str, cancel: &CancellationToken) -> Result<Vec<BundleInfo>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(hostsync_fs::Error::io(&self.directory, e).into()),
        };

        let mut infos = Vec::new();
        for entry in entries {
            check_cancelled(cancel)?;
            let entry = entry.map_err(|e| hostsync_fs::Error::io(&self.directory, e))?;
            let path = entry.path();
            let Some(id) = bundle_id_of(&path) else {
                continue;
            };
            let Some((owner, created)) = parse_bundle_id(&id) else {
                tracing::trace!(file = %path.display(), "Ignoring file with unexpected name");
                continue;
            };
            if owner != profile_id {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(|e| hostsync_fs::Error::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            infos.push(BundleInfo {
                profile_id: owner.to_string(),
                created,
                size: metadata.len(),
                id,
            });
        }
        infos.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(infos)
    }
}

/// Bundle id encoded in an archive file name, skipping hidden files.
fn bundle_id_of(path: &Path) -> Option<String> {
    if path.extension() != Some(OsStr::new(BUNDLE_EXTENSION)) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

#[async_trait]
impl BundleFactory for ZipBundleFactory {
    async fn create(
        &self,
        profile_id: &str,
        timestamp: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Bundle>> {
        check_cancelled(cancel)?;
        validate_path_identifier(profile_id, "profile id")?;
        let id = format_bundle_id(profile_id, timestamp);
        let bundle = ZipBundle::create(&id, &self.path_of(&id))?;
        Ok(Box::new(bundle))
    }

    async fn open(&self, id: &str, cancel: &CancellationToken) -> Result<Box<dyn Bundle>> {
        check_cancelled(cancel)?;
        let bundle = ZipBundle::open(id, &self.path_of(id))?;
        Ok(Box::new(bundle))
    }

    async fn get_all(&self, profile_id: &str, cancel: &CancellationToken) -> Result<Vec<BundleInfo>> {
        self.list(profile_id, cancel)
    }

    async fn remove(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        let path = self.path_of(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(bundle = %id, "Bundle removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::BundleNotFound { id: id.to_string() })
            }
            Err(e) => Err(hostsync_fs::Error::io(&path, e).into()),
        }
    }

    fn monitor(&self) -> Option<&dyn Monitor<BundleEvent>> {
        Some(&self.monitor)
    }
}
