//! Polling file watcher
//!
//! Bundle directories typically live on network shares or inside folders
//! managed by sync clients, where native change notifications are missing
//! or unreliable. The watcher therefore compares periodic snapshots of
//! modification time and size.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Modification stamp of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileStamp {
    /// Stamp of the file at `path`, or `None` when it is not a readable file.
    pub fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Stamps of every watched file, keyed by path.
pub type Snapshot = BTreeMap<PathBuf, FileStamp>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

/// Snapshot the files of `dir`, descending into subdirectories when `recursive`.
pub fn scan_dir(dir: &Path, recursive: bool) -> Snapshot {
    let mut snapshot = Snapshot::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() && recursive => pending.push(path),
                Ok(t) if t.is_file() => {
                    if let Some(stamp) = FileStamp::of(&path) {
                        snapshot.insert(path, stamp);
                    }
                }
                _ => {}
            }
        }
    }
    snapshot
}

/// Snapshot an explicit list of files; missing files are left out.
pub fn scan_paths<I>(paths: I) -> Snapshot
where
    I: IntoIterator<Item = PathBuf>,
{
    paths
        .into_iter()
        .filter_map(|path| FileStamp::of(&path).map(|stamp| (path, stamp)))
        .collect()
}

/// Compute the changes that turn `old` into `new`.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<FsEvent> {
    let mut events = Vec::new();
    for (path, stamp) in new {
        match old.get(path) {
            None => events.push(FsEvent {
                path: path.clone(),
                kind: FsEventKind::Created,
            }),
            Some(previous) if previous != stamp => events.push(FsEvent {
                path: path.clone(),
                kind: FsEventKind::Modified,
            }),
            Some(_) => {}
        }
    }
    for path in old.keys().filter(|p| !new.contains_key(*p)) {
        events.push(FsEvent {
            path: path.clone(),
            kind: FsEventKind::Removed,
        });
    }
    events
}

/// A background task that rescans on a fixed interval and reports differences.
///
/// The baseline snapshot is taken synchronously in [`PollWatcher::spawn`], so
/// changes made before `spawn` returns are never reported. Dropping the
/// watcher stops it; events from a scan that was in flight are discarded.
/// Must be called from within a tokio runtime.
#[derive(Debug)]
pub struct PollWatcher {
    cancel: CancellationToken,
}

impl PollWatcher {
    pub fn spawn<S, H>(interval: Duration, scan: S, on_events: H) -> Self
    where
        S: Fn() -> Snapshot + Send + Sync + 'static,
        H: Fn(Vec<FsEvent>) + Send + Sync + 'static,
    {
        let scan = Arc::new(scan);
        let baseline = scan();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut previous = baseline;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let scanner = Arc::clone(&scan);
                let current = match tokio::task::spawn_blocking(move || scanner()).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!(error = %e, "Watcher scan failed");
                        continue;
                    }
                };
                if token.is_cancelled() {
                    break;
                }

                let events = diff(&previous, &current);
                previous = current;
                if !events.is_empty() {
                    tracing::trace!(count = events.len(), "Watcher detected changes");
                    on_events(events);
                }
            }
        });

        Self { cancel }
    }

    /// Stop polling. Equivalent to dropping the watcher.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for PollWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
