//! Bundle abstraction: timestamped snapshots of a profile's settings

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::monitor::{BundleEvent, Monitor};
use crate::setting::Setting;
use crate::time;

/// Separator between the profile id and the timestamp in a bundle id.
pub const BUNDLE_ID_SEPARATOR: char = '@';

/// Build the id of a bundle for `profile_id` created at `timestamp`.
///
/// Ids of one profile sort chronologically as plain strings.
pub fn format_bundle_id(profile_id: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        profile_id,
        BUNDLE_ID_SEPARATOR,
        time::format_bundle_time(timestamp)
    )
}

/// Split a bundle id into profile id and creation time.
pub fn parse_bundle_id(id: &str) -> Option<(&str, DateTime<Utc>)> {
    let (profile_id, stamp) = id.rsplit_once(BUNDLE_ID_SEPARATOR)?;
    if profile_id.is_empty() {
        return None;
    }
    Some((profile_id, time::parse_bundle_time(stamp)?))
}

/// Directory listing entry for a bundle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BundleInfo {
    pub id: String,
    pub profile_id: String,
    pub created: DateTime<Utc>,
    pub size: u64,
}

impl BundleInfo {
    /// Age in fractional days at `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created).num_milliseconds() as f64 / 86_400_000.0
    }

    pub fn is_outdated(&self, now: DateTime<Utc>, max_days: f64) -> bool {
        self.age_days(now) > max_days
    }
}

/// One opened bundle, either for writing (created) or reading (opened).
///
/// Operations that do not match the open mode fail with
/// [`Error::BundleMode`](crate::Error::BundleMode). Archive I/O is
/// synchronous; a bundle is only ever driven by one command at a time.
pub trait Bundle: Send {
    fn id(&self) -> &str;

    /// Store a setting under `target_id`; returns the entry name.
    fn put_setting(
        &mut self,
        target_id: &str,
        setting: &Setting,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Store metadata for `target_id`, or profile-level metadata when
    /// `target_id` is empty.
    fn put_metadata(
        &mut self,
        target_id: &str,
        metadata: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Read back every setting stored for `target_id`, in write order.
    fn settings(&mut self, target_id: &str, cancel: &CancellationToken) -> Result<Vec<Setting>>;

    /// Read metadata for `target_id`, or profile-level metadata when empty.
    fn metadata(
        &mut self,
        target_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>>;

    /// Finalize a written bundle or release a read one.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Creates, opens, lists and removes bundles in a backing store.
#[async_trait]
pub trait BundleFactory: Send + Sync {
    /// Open a new bundle for writing.
    async fn create(
        &self,
        profile_id: &str,
        timestamp: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Bundle>>;

    /// Open an existing bundle for reading.
    async fn open(&self, id: &str, cancel: &CancellationToken) -> Result<Box<dyn Bundle>>;

    /// All bundles of a profile, oldest first.
    async fn get_all(&self, profile_id: &str, cancel: &CancellationToken) -> Result<Vec<BundleInfo>>;

    async fn get_latest(
        &self,
        profile_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<BundleInfo>> {
        Ok(self.get_all(profile_id, cancel).await?.pop())
    }

    async fn remove(&self, id: &str, cancel: &CancellationToken) -> Result<()>;

    /// Storage monitor, for factories that can watch for new bundles.
    fn monitor(&self) -> Option<&dyn Monitor<BundleEvent>> {
        None
    }
}
