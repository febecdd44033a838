//! Clean: remove outdated bundles

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::bundle::BundleFactory;
use crate::error::check_cancelled;
use crate::profile::Profile;
use crate::Result;

/// Bundles older than this many days are removed by default.
pub const DEFAULT_MAX_DAYS: f64 = 14.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Ids of the removed bundles, by profile in the order given, then
    /// oldest first.
    pub removed: Vec<String>,
}

/// Remove the bundles of each profile whose age exceeds `max_days`.
///
/// The latest bundle is not treated specially: when it is older than the
/// threshold it goes too. The first failure stops the command; bundles
/// removed before it stay removed.
pub struct CleanCommand<'a> {
    profiles: &'a [Arc<Profile>],
    factory: &'a dyn BundleFactory,
    max_days: f64,
}

impl<'a> CleanCommand<'a> {
    pub fn new(profiles: &'a [Arc<Profile>], factory: &'a dyn BundleFactory) -> Self {
        Self {
            profiles,
            factory,
            max_days: DEFAULT_MAX_DAYS,
        }
    }

    pub fn max_days(mut self, max_days: f64) -> Self {
        self.max_days = max_days;
        self
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<CleanReport> {
        check_cancelled(cancel)?;
        let now = Utc::now();
        let mut report = CleanReport::default();

        for profile in self.profiles {
            for info in self.factory.get_all(profile.id(), cancel).await? {
                check_cancelled(cancel)?;
                if !info.is_outdated(now, self.max_days) {
                    continue;
                }
                tracing::info!(
                    profile = %profile.id(),
                    bundle = %info.id,
                    age_days = info.age_days(now),
                    "Removing outdated bundle"
                );
                self.factory.remove(&info.id, cancel).await?;
                report.removed.push(info.id);
            }
        }
        tracing::info!(removed = report.removed.len(), max_days = self.max_days, "Clean finished");
        Ok(report)
    }
}
