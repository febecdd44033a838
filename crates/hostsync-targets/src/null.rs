//! The `null` target: a placeholder that always reports a fresh change

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostsync_core::{Result, Setting, SyncContext, Target, TokenResolver, check_cancelled};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Stores nothing and imports nothing.
///
/// Its last update is always "now", which makes a profile holding only
/// `null` targets export on every run. Useful for exercising a bundle
/// directory without touching local files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NullTarget {}

#[async_trait]
impl Target for NullTarget {
    fn type_name(&self) -> &'static str {
        "null"
    }

    fn substitute(&mut self, _tokens: &dyn TokenResolver) -> Result<()> {
        Ok(())
    }

    async fn export(&self, _context: &SyncContext, cancel: &CancellationToken) -> Result<Vec<Setting>> {
        check_cancelled(cancel)?;
        Ok(vec![Setting::empty()])
    }

    async fn import(
        &self,
        _context: &SyncContext,
        _settings: Vec<Setting>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel)
    }

    async fn last_update(
        &self,
        _context: &SyncContext,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        check_cancelled(cancel)?;
        Ok(Some(Utc::now()))
    }
}
