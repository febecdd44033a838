//! Export: write local settings into a new bundle

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::bundle::{Bundle, BundleFactory};
use crate::context::SyncContext;
use crate::error::check_cancelled;
use crate::profile::{Profile, ProfileTarget, bundle_update_of, local_update_of};
use crate::setting::{KEY_HOSTNAME, KEY_LAST_UPDATE, KEY_TYPE};
use crate::{Error, Result, time};

/// Result of an export that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A bundle was written.
    Exported { bundle_id: String, settings: usize },
    /// Targets produced no settings; no bundle was kept.
    NothingExported,
    /// No target reported a local update time.
    CannotDetermineLocalDate,
    /// The latest bundle is as new as the local settings.
    SettingsOlderThanBundle { bundle_id: String },
}

/// Export a profile's settings into a new bundle.
///
/// The export is all-or-nothing: when any step after bundle creation fails,
/// the partial bundle is removed before the error is returned.
pub struct ExportCommand<'a> {
    profile: &'a Profile,
    factory: &'a dyn BundleFactory,
    force: bool,
}

impl<'a> ExportCommand<'a> {
    pub fn new(profile: &'a Profile, factory: &'a dyn BundleFactory) -> Self {
        Self {
            profile,
            factory,
            force: false,
        }
    }

    /// Export even when the latest bundle is newer than the local settings.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<ExportOutcome> {
        check_cancelled(cancel)?;
        let profile = self.profile;
        let _guard = profile.lock().await;
        tracing::info!(profile = %profile.id(), name = %profile.name(), "Starting export");

        profile.validate_targets()?;
        let targets = profile.eligible_targets(cancel).await?;

        let Some(local_time) = local_update_of(&targets, &SyncContext::new(), cancel).await? else {
            tracing::warn!(profile = %profile.id(), "Cannot determine latest local update, skipping");
            return Ok(ExportOutcome::CannotDetermineLocalDate);
        };

        if let Some(latest) = self.factory.get_latest(profile.id(), cancel).await? {
            let mut bundle = self.factory.open(&latest.id, cancel).await?;
            let bundle_time = bundle_update_of(&targets, bundle.as_mut(), cancel);
            let closed = bundle.close();
            let bundle_time = bundle_time?;
            closed?;

            if let Some(bundle_time) = bundle_time {
                if bundle_time >= local_time && !self.force {
                    tracing::info!(
                        profile = %profile.id(),
                        %local_time,
                        %bundle_time,
                        bundle = %latest.id,
                        "Skipping export, local settings are not newer than the bundle"
                    );
                    return Ok(ExportOutcome::SettingsOlderThanBundle {
                        bundle_id: latest.id,
                    });
                }
            }
        }

        let mut lazy = LazyBundle::new(self.factory, profile.id(), local_time);
        let written = match write_targets(&targets, &mut lazy, local_time, cancel).await {
            Ok(written) => lazy.close().map(|id| (id, written)),
            Err(e) => Err(e),
        };

        match written {
            Ok((Some(bundle_id), settings)) => {
                tracing::info!(profile = %profile.id(), bundle = %bundle_id, settings, "Export finished");
                Ok(ExportOutcome::Exported {
                    bundle_id,
                    settings,
                })
            }
            Ok((None, _)) => {
                tracing::info!(profile = %profile.id(), "Nothing to export");
                Ok(ExportOutcome::NothingExported)
            }
            Err(e) => {
                lazy.rollback().await;
                Err(e)
            }
        }
    }
}

async fn write_targets(
    targets: &[&ProfileTarget],
    lazy: &mut LazyBundle<'_>,
    local_time: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let context = SyncContext::new();
    let mut total = 0;

    for target in targets {
        check_cancelled(cancel)?;
        if context.is_processing_cancelled() {
            break;
        }

        let settings = target.target.export(&context, cancel).await?;
        let mut written = 0;
        for mut setting in settings {
            check_cancelled(cancel)?;
            if context.is_processing_cancelled() {
                tracing::info!(target_id = %target.id, "Target requested to stop export processing");
                break;
            }
            if setting.is_empty() {
                continue;
            }
            if setting.id.is_none() {
                setting.id = Some(format!("{:03}", written));
            }
            lazy.get(cancel)
                .await?
                .put_setting(&target.id, &setting, cancel)?;
            written += 1;
        }

        if written > 0 {
            let metadata = BTreeMap::from([
                (KEY_TYPE.to_string(), target.target.type_name().to_string()),
                (KEY_LAST_UPDATE.to_string(), time::to_ticks(local_time).to_string()),
            ]);
            lazy.get(cancel)
                .await?
                .put_metadata(&target.id, &metadata, cancel)?;
            tracing::debug!(target_id = %target.id, settings = written, "Target exported");
        }
        total += written;
    }

    if total > 0 {
        let metadata = BTreeMap::from([(KEY_HOSTNAME.to_string(), host_name())]);
        lazy.get(cancel).await?.put_metadata("", &metadata, cancel)?;
    }
    Ok(total)
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Defers bundle creation until the first write, so an export that
/// produces nothing leaves no bundle behind.
struct LazyBundle<'a> {
    factory: &'a dyn BundleFactory,
    profile_id: &'a str,
    timestamp: DateTime<Utc>,
    bundle: Option<Box<dyn Bundle>>,
    id: Option<String>,
    committed: bool,
}

impl<'a> LazyBundle<'a> {
    fn new(factory: &'a dyn BundleFactory, profile_id: &'a str, timestamp: DateTime<Utc>) -> Self {
        Self {
            factory,
            profile_id,
            timestamp,
            bundle: None,
            id: None,
            committed: false,
        }
    }

    async fn get(&mut self, cancel: &CancellationToken) -> Result<&mut dyn Bundle> {
        if self.bundle.is_none() && self.id.is_none() {
            let bundle = self
                .factory
                .create(self.profile_id, self.timestamp, cancel)
                .await?;
            tracing::debug!(bundle = %bundle.id(), "Created bundle");
            self.id = Some(bundle.id().to_string());
            self.bundle = Some(bundle);
        }
        match self.bundle.as_deref_mut() {
            Some(bundle) => Ok(bundle),
            None => Err(Error::BundleMode {
                bundle: self.id.clone().unwrap_or_default(),
                expected: "write",
            }),
        }
    }

    /// Finalize the bundle, returning its id when one was created.
    fn close(&mut self) -> Result<Option<String>> {
        if let Some(bundle) = self.bundle.take() {
            bundle.close()?;
            self.committed = true;
        }
        Ok(self.id.clone())
    }

    /// Discard whatever was written.
    ///
    /// An unclosed bundle never reached its final location, so dropping it is
    /// enough. Only a bundle this export finalized is removed by id; another
    /// bundle created in the same second shares that id and must survive.
    async fn rollback(&mut self) {
        drop(self.bundle.take());
        let Some(id) = self.id.take() else {
            return;
        };
        if !self.committed {
            tracing::warn!(bundle = %id, "Export failed, discarded unfinished bundle");
            return;
        }
        tracing::warn!(bundle = %id, "Export failed, removing finalized bundle");
        // The caller's token may be what triggered the failure.
        if let Err(e) = self.factory.remove(&id, &CancellationToken::new()).await {
            tracing::error!(bundle = %id, error = %e, "Failed to remove partial bundle");
        }
        self.committed = false;
    }
}
