//! Continuous synchronization driven by change monitors

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bundle::BundleFactory;
use crate::commands::{ExportCommand, ImportCommand};
use crate::error::check_cancelled;
use crate::profile::Profile;
use crate::runner::{DEFAULT_TICK, DelayActionRunner};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Quiet period after the last local change before exporting.
    pub execution_delay: Duration,
    /// Delay before a failed export is retried. Zero disables retries.
    pub fail_retry: Duration,
    /// How often pending exports are checked.
    pub tick: Duration,
    pub disable_import: bool,
    pub disable_export: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            execution_delay: Duration::from_secs(3),
            fail_retry: Duration::from_secs(30),
            tick: DEFAULT_TICK,
            disable_import: false,
            disable_export: false,
        }
    }
}

type Profiles = Arc<HashMap<String, Arc<Profile>>>;

/// A running monitor session, returned by [`StartMonitorCommand::execute`].
#[derive(Debug)]
pub struct MonitorSession {
    runner: Option<Arc<DelayActionRunner<String>>>,
    tasks: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorSession {
    /// The export scheduler, absent when exports are disabled.
    pub fn runner(&self) -> Option<&Arc<DelayActionRunner<String>>> {
        self.runner.as_ref()
    }

    fn shutdown(&mut self) {
        if let Some(runner) = &self.runner {
            runner.stop();
        }
        self.tasks.cancel();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bring every profile up to date, then keep it synchronized.
///
/// Each profile first imports the latest bundle and then exports. Local
/// changes reported by target monitors queue a debounced export; new
/// bundles reported by the factory monitor trigger an import.
pub struct StartMonitorCommand {
    profiles: Vec<Arc<Profile>>,
    factory: Arc<dyn BundleFactory>,
    options: MonitorOptions,
}

impl StartMonitorCommand {
    pub fn new(profiles: Vec<Arc<Profile>>, factory: Arc<dyn BundleFactory>) -> Self {
        Self {
            profiles,
            factory,
            options: MonitorOptions::default(),
        }
    }

    pub fn options(mut self, options: MonitorOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<MonitorSession> {
        let mut synced = Vec::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            check_cancelled(cancel)?;
            match initial_sync(profile, self.factory.as_ref(), cancel).await {
                Ok(()) => synced.push(Arc::clone(profile)),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(profile = %profile.id(), error = %e, "Initial synchronization failed, profile not monitored");
                }
            }
        }

        let profiles: Profiles = Arc::new(
            synced
                .iter()
                .map(|p| (p.id().to_string(), Arc::clone(p)))
                .collect(),
        );
        let mut session = MonitorSession {
            runner: None,
            tasks: cancel.child_token(),
            handles: Vec::new(),
        };

        if self.options.disable_export {
            tracing::info!("Export disabled, local changes are not monitored");
        } else {
            let runner = Arc::new(self.export_runner(&profiles, cancel));
            for profile in &synced {
                for target in profile.targets().iter().filter(|t| t.enabled) {
                    let Some(monitor) = target.target.monitor() else {
                        continue;
                    };
                    let mut events = monitor.subscribe();
                    let runner = Arc::clone(&runner);
                    let tasks = session.tasks.clone();
                    let profile_id = profile.id().to_string();
                    session.handles.push(tokio::spawn(async move {
                        loop {
                            tokio::select! {
                                _ = tasks.cancelled() => break,
                                event = events.recv() => match event {
                                    Ok(event) => {
                                        tracing::debug!(profile = %profile_id, paths = event.paths.len(), "Local change detected");
                                        runner.queue(profile_id.clone());
                                    }
                                    Err(RecvError::Lagged(_)) => runner.queue(profile_id.clone()),
                                    Err(RecvError::Closed) => break,
                                },
                            }
                        }
                    }));
                }
                profile.start_monitor()?;
            }
            runner.start();
            session.runner = Some(runner);
        }

        if self.options.disable_import {
            tracing::info!("Import disabled, bundles are not monitored");
        } else if let Some(monitor) = self.factory.monitor() {
            let mut events = monitor.subscribe();
            let tasks = session.tasks.clone();
            let factory = Arc::clone(&self.factory);
            let profiles = Arc::clone(&profiles);
            session.handles.push(tokio::spawn(async move {
                loop {
                    let event = tokio::select! {
                        _ = tasks.cancelled() => break,
                        event = events.recv() => event,
                    };
                    let event = match event {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Bundle events lagged");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    let Some(profile) = profiles.get(&event.profile_id) else {
                        continue;
                    };
                    tracing::info!(profile = %event.profile_id, bundle = %event.bundle_id, "New bundle detected");
                    if let Err(e) = import_while_paused(profile, factory.as_ref(), &tasks).await {
                        tracing::warn!(profile = %event.profile_id, error = %e, "Import after bundle change failed");
                    }
                }
            }));
            monitor.start_monitor()?;
        } else {
            tracing::info!("Bundle storage cannot be monitored, imports happen only at start");
        }

        tracing::info!(profiles = synced.len(), "Monitoring started");
        Ok(session)
    }

    fn export_runner(&self, profiles: &Profiles, cancel: &CancellationToken) -> DelayActionRunner<String> {
        let profiles = Arc::clone(profiles);
        let factory = Arc::clone(&self.factory);
        let cancel = cancel.clone();
        DelayActionRunner::new(
            move |profile_id: String| {
                let profiles = Arc::clone(&profiles);
                let factory = Arc::clone(&factory);
                let cancel = cancel.clone();
                async move {
                    let profile = profiles
                        .get(&profile_id)
                        .ok_or_else(|| Error::config(format!("unknown profile {}", profile_id)))?;
                    export_while_paused(profile, factory.as_ref(), &cancel).await
                }
            },
            self.options.execution_delay,
            self.options.fail_retry,
        )
        .with_tick(self.options.tick)
    }
}

async fn initial_sync(
    profile: &Profile,
    factory: &dyn BundleFactory,
    cancel: &CancellationToken,
) -> Result<()> {
    let imported = ImportCommand::new(profile, factory).execute(cancel).await?;
    tracing::debug!(profile = %profile.id(), ?imported, "Initial import");
    let exported = ExportCommand::new(profile, factory).execute(cancel).await?;
    tracing::debug!(profile = %profile.id(), ?exported, "Initial export");
    Ok(())
}

/// Export with the bundle monitor paused, so our own bundle does not
/// trigger an import.
async fn export_while_paused(
    profile: &Profile,
    factory: &dyn BundleFactory,
    cancel: &CancellationToken,
) -> Result<()> {
    let monitor = factory.monitor();
    let was_monitoring = monitor.is_some_and(|m| m.is_monitoring());
    if let Some(monitor) = monitor {
        monitor.stop_monitor();
    }
    let result = ExportCommand::new(profile, factory).execute(cancel).await;
    if was_monitoring {
        if let Some(monitor) = monitor {
            monitor.start_monitor()?;
        }
    }
    let outcome = result?;
    tracing::debug!(profile = %profile.id(), ?outcome, "Scheduled export");
    Ok(())
}

/// Import with the profile's target monitors paused, so written files do
/// not queue an export.
async fn import_while_paused(
    profile: &Profile,
    factory: &dyn BundleFactory,
    cancel: &CancellationToken,
) -> Result<()> {
    let was_monitoring = profile.is_monitoring();
    profile.stop_monitor();
    let result = ImportCommand::new(profile, factory).execute(cancel).await;
    if was_monitoring {
        profile.start_monitor()?;
    }
    let outcome = result?;
    tracing::debug!(profile = %profile.id(), ?outcome, "Bundle import");
    Ok(())
}

/// Stop everything a [`StartMonitorCommand`] started.
pub struct StopMonitorCommand {
    profiles: Vec<Arc<Profile>>,
    factory: Arc<dyn BundleFactory>,
}

impl StopMonitorCommand {
    pub fn new(profiles: Vec<Arc<Profile>>, factory: Arc<dyn BundleFactory>) -> Self {
        Self { profiles, factory }
    }

    /// Stops the session's scheduler when given, then every monitor.
    /// Safe to call when nothing is running.
    pub fn execute(&self, session: Option<&mut MonitorSession>) {
        if let Some(session) = session {
            session.shutdown();
        }
        for profile in &self.profiles {
            profile.stop_monitor();
        }
        if let Some(monitor) = self.factory.monitor() {
            monitor.stop_monitor();
        }
        tracing::info!("Monitoring stopped");
    }
}
