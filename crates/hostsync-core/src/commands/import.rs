//! Import: apply the latest bundle to the local targets

use tokio_util::sync::CancellationToken;

use crate::bundle::{Bundle, BundleFactory};
use crate::context::SyncContext;
use crate::error::check_cancelled;
use crate::profile::{Profile, ProfileTarget, bundle_update_of, local_update_of};
use crate::Result;

/// Result of an import that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Settings from the bundle were applied.
    Imported { bundle_id: String },
    /// The profile has no bundle yet.
    NoBundles,
    /// No target reported a local update time.
    CannotGetLocalDate,
    /// Local settings are at least as new as the latest bundle.
    LocalAlreadyNewer { bundle_id: String },
}

/// Import the latest bundle of a profile into its eligible targets.
pub struct ImportCommand<'a> {
    profile: &'a Profile,
    factory: &'a dyn BundleFactory,
    force: bool,
}

impl<'a> ImportCommand<'a> {
    pub fn new(profile: &'a Profile, factory: &'a dyn BundleFactory) -> Self {
        Self {
            profile,
            factory,
            force: false,
        }
    }

    /// Import even when local settings are newer or undated.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<ImportOutcome> {
        check_cancelled(cancel)?;
        let profile = self.profile;
        let _guard = profile.lock().await;
        tracing::info!(profile = %profile.id(), name = %profile.name(), "Starting import");

        profile.validate_targets()?;

        let Some(latest) = self.factory.get_latest(profile.id(), cancel).await? else {
            tracing::info!(profile = %profile.id(), "No bundles found, nothing to import");
            return Ok(ImportOutcome::NoBundles);
        };

        let targets = profile.eligible_targets(cancel).await?;
        let mut bundle = self.factory.open(&latest.id, cancel).await?;
        let result = self
            .import_from(&targets, bundle.as_mut(), &latest.id, cancel)
            .await;
        let closed = bundle.close();
        let outcome = result?;
        closed?;

        if let ImportOutcome::Imported { bundle_id } = &outcome {
            tracing::info!(profile = %profile.id(), bundle = %bundle_id, "Import finished");
        }
        Ok(outcome)
    }

    async fn import_from(
        &self,
        targets: &[&ProfileTarget],
        bundle: &mut dyn Bundle,
        bundle_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome> {
        let local_time = local_update_of(targets, &SyncContext::new(), cancel).await?;
        if local_time.is_none() && !self.force {
            tracing::warn!(profile = %self.profile.id(), "Cannot determine latest local update, skipping");
            return Ok(ImportOutcome::CannotGetLocalDate);
        }

        let bundle_time = bundle_update_of(targets, bundle, cancel)?;
        if let (Some(local), Some(remote)) = (local_time, bundle_time) {
            if local >= remote && !self.force {
                tracing::info!(
                    profile = %self.profile.id(),
                    %local,
                    %remote,
                    bundle = %bundle_id,
                    "Skipping import, local settings are already newer"
                );
                return Ok(ImportOutcome::LocalAlreadyNewer {
                    bundle_id: bundle_id.to_string(),
                });
            }
        }

        let context = SyncContext::new();
        for target in targets {
            check_cancelled(cancel)?;
            if context.is_processing_cancelled() {
                tracing::info!(target_id = %target.id, "Target requested to stop import processing");
                break;
            }
            let settings = bundle.settings(&target.id, cancel)?;
            tracing::debug!(target_id = %target.id, settings = settings.len(), "Importing target");
            target.target.import(&context, settings, cancel).await?;
        }

        Ok(ImportOutcome::Imported {
            bundle_id: bundle_id.to_string(),
        })
    }
}
