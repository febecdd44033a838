//! Change monitors for targets and bundle storage
//!
//! Monitors publish events on a broadcast channel; any number of
//! subscribers (the monitor coordinator, a status display) can listen.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostsync_fs::{FsEvent, PollWatcher, Snapshot};
use tokio::sync::broadcast;

use crate::{Error, Result};

/// Default interval between two scans of a polling monitor.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 64;

/// Local content of a target changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEvent {
    pub paths: Vec<PathBuf>,
}

/// A bundle for a profile appeared or changed in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEvent {
    pub profile_id: String,
    pub bundle_id: String,
}

/// Start/stop control and event subscription for a change monitor.
pub trait Monitor<E>: Send + Sync {
    /// Start watching. Starting a running monitor is a no-op.
    fn start_monitor(&self) -> Result<()>;

    /// Stop watching. Stopping a stopped monitor is a no-op.
    fn stop_monitor(&self);

    fn is_monitoring(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<E>;
}

type ScanFn = Arc<dyn Fn() -> Snapshot + Send + Sync>;
type MapFn<E> = Arc<dyn Fn(Vec<FsEvent>) -> Vec<E> + Send + Sync>;

/// A [`Monitor`] backed by a [`PollWatcher`].
///
/// `scan` produces the watched snapshot; `map` turns raw file events into
/// domain events, dropping the ones that are not interesting.
pub struct PollMonitor<E> {
    name: String,
    interval: Duration,
    scan: ScanFn,
    map: MapFn<E>,
    sender: broadcast::Sender<E>,
    watcher: Mutex<Option<PollWatcher>>,
}

impl<E: Clone + Send + 'static> PollMonitor<E> {
    pub fn new<S, M>(name: impl Into<String>, interval: Duration, scan: S, map: M) -> Self
    where
        S: Fn() -> Snapshot + Send + Sync + 'static,
        M: Fn(Vec<FsEvent>) -> Vec<E> + Send + Sync + 'static,
    {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: name.into(),
            interval,
            scan: Arc::new(scan),
            map: Arc::new(map),
            sender,
            watcher: Mutex::new(None),
        }
    }
}

impl<E: Clone + Send + 'static> Monitor<E> for PollMonitor<E> {
    fn start_monitor(&self) -> Result<()> {
        let mut watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner());
        if watcher.is_some() {
            tracing::debug!(monitor = %self.name, "Monitor is already running");
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::Monitor {
                message: format!("cannot start {} outside of an async runtime", self.name),
            });
        }

        let scan = Arc::clone(&self.scan);
        let map = Arc::clone(&self.map);
        let sender = self.sender.clone();
        let name = self.name.clone();
        *watcher = Some(PollWatcher::spawn(
            self.interval,
            move || scan(),
            move |events| {
                for event in map(events) {
                    tracing::debug!(monitor = %name, "Change detected");
                    // No receivers is fine: nobody is listening yet.
                    let _ = sender.send(event);
                }
            },
        ));
        tracing::info!(monitor = %self.name, "Monitor started");
        Ok(())
    }

    fn stop_monitor(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(watcher) = watcher {
            watcher.stop();
            tracing::info!(monitor = %self.name, "Monitor stopped");
        }
    }

    fn is_monitoring(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl<E> fmt::Debug for PollMonitor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollMonitor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
