//! Target trait: one synchronizable unit

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::context::SyncContext;
use crate::monitor::{Monitor, TargetEvent};
use crate::setting::Setting;
use crate::tokens::TokenResolver;
use crate::validation::ValidationErrors;

/// Core trait for synchronizable targets.
///
/// A target knows how to turn local state into settings (`export`), how to
/// apply settings read from a bundle (`import`) and when its local state was
/// last changed (`last_update`). Identity and gating conditions are held by
/// the owning [`ProfileTarget`](crate::ProfileTarget).
#[async_trait]
pub trait Target: Send + Sync + Debug {
    /// Type tag as written in profile documents and bundle metadata.
    fn type_name(&self) -> &'static str;

    fn validate(&self) -> ValidationErrors {
        ValidationErrors::new()
    }

    /// Expand template tokens in the target's string fields.
    fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()>;

    /// Produce the settings to store, in order. A target with nothing to
    /// store returns [`Setting::empty`] or no settings at all.
    async fn export(&self, context: &SyncContext, cancel: &CancellationToken)
    -> Result<Vec<Setting>>;

    /// Apply settings previously produced by `export` on some host.
    async fn import(
        &self,
        context: &SyncContext,
        settings: Vec<Setting>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Time of the latest local change, or `None` when it cannot be determined.
    async fn last_update(
        &self,
        context: &SyncContext,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Change monitor, for targets that can watch their local state.
    fn monitor(&self) -> Option<&dyn Monitor<TargetEvent>> {
        None
    }
}
