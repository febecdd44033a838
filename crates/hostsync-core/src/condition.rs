//! Condition trait: predicates gating a target

use std::fmt::Debug;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::tokens::TokenResolver;
use crate::validation::ValidationErrors;

/// A predicate evaluated before its target runs.
///
/// Conditions are evaluated fresh on every export, import and last-update
/// computation; implementations must not cache the result.
#[async_trait]
pub trait Condition: Send + Sync + Debug {
    /// Type tag as written in profile documents.
    fn type_name(&self) -> &'static str;

    fn validate(&self) -> ValidationErrors {
        ValidationErrors::new()
    }

    /// Expand template tokens in the condition's string fields.
    fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()>;

    async fn is_satisfied(&self, cancel: &CancellationToken) -> Result<bool>;
}
