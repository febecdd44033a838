//! Profiles: named collections of targets

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use hostsync_fs::validate_path_identifier;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::bundle::Bundle;
use crate::condition::Condition;
use crate::context::SyncContext;
use crate::error::check_cancelled;
use crate::setting::KEY_LAST_UPDATE;
use crate::target::Target;
use crate::validation::ValidationErrors;
use crate::{Result, time};

/// A condition together with its id inside the owning target.
#[derive(Debug)]
pub struct TargetCondition {
    pub id: String,
    pub condition: Box<dyn Condition>,
}

/// A target together with its identity and gating inside a profile.
#[derive(Debug)]
pub struct ProfileTarget {
    pub id: String,
    pub enabled: bool,
    pub conditions: Vec<TargetCondition>,
    pub target: Box<dyn Target>,
}

impl ProfileTarget {
    pub fn new(id: impl Into<String>, target: Box<dyn Target>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            conditions: Vec::new(),
            target,
        }
    }

    pub fn with_condition(mut self, id: impl Into<String>, condition: Box<dyn Condition>) -> Self {
        self.conditions.push(TargetCondition {
            id: id.into(),
            condition,
        });
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Evaluate every condition; all must hold.
    ///
    /// A condition that fails to evaluate counts as not satisfied. Only
    /// cancellation is reported as an error.
    pub async fn conditions_satisfied(&self, cancel: &CancellationToken) -> Result<bool> {
        for item in &self.conditions {
            check_cancelled(cancel)?;
            match item.condition.is_satisfied(cancel).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(target_id = %self.id, condition = %item.id, "Condition not satisfied");
                    return Ok(false);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        target_id = %self.id,
                        condition = %item.id,
                        error = %e,
                        "Condition failed to evaluate, treating as not satisfied"
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = self.target.validate();
        let mut seen = HashSet::new();
        for item in &self.conditions {
            if !seen.insert(item.id.as_str()) {
                errors.add(format!("conditions[{}]", item.id), "duplicate condition id");
            }
            errors.extend_prefixed(&format!("conditions[{}]", item.id), item.condition.validate());
        }
        errors
    }
}

/// A named set of targets synchronized together.
#[derive(Debug)]
pub struct Profile {
    id: String,
    name: String,
    description: Option<String>,
    targets: Vec<ProfileTarget>,
    lock: Mutex<()>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            targets: Vec::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_target(mut self, target: ProfileTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub fn add_target(&mut self, target: ProfileTarget) {
        self.targets.push(target);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn targets(&self) -> &[ProfileTarget] {
        &self.targets
    }

    /// Validate the profile's own fields and every target.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        if let Err(e) = validate_path_identifier(&self.id, "profile id") {
            errors.add("id", e.to_string());
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            let prefix = format!("targets[{}]", target.id);
            if !seen.insert(target.id.as_str()) {
                errors.add(&prefix, "duplicate target id");
            }
            errors.extend_prefixed(&prefix, target.validate());
        }
        errors
    }

    /// Fail with [`Error::Validation`](crate::Error::Validation) on any violation.
    pub fn validate_targets(&self) -> Result<()> {
        let errors = self.validate();
        if let Some(first) = errors.iter().next() {
            tracing::info!(profile = %self.id, field = %first.field, "{}", first.message);
        }
        errors.into_result()
    }

    /// Enabled targets whose conditions currently hold, in declaration order.
    pub async fn eligible_targets(&self, cancel: &CancellationToken) -> Result<Vec<&ProfileTarget>> {
        let mut eligible = Vec::new();
        for target in self.targets.iter().filter(|t| t.enabled) {
            if target.conditions_satisfied(cancel).await? {
                eligible.push(target);
            } else {
                tracing::info!(profile = %self.id, target_id = %target.id, "Skipping target, conditions not satisfied");
            }
        }
        Ok(eligible)
    }

    /// Latest local change over the eligible targets.
    pub async fn latest_local_update(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        let targets = self.eligible_targets(cancel).await?;
        local_update_of(&targets, &SyncContext::new(), cancel).await
    }

    /// Latest `last-update` recorded in `bundle` for the eligible targets.
    pub async fn latest_bundle_update(
        &self,
        bundle: &mut dyn Bundle,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        let targets = self.eligible_targets(cancel).await?;
        bundle_update_of(&targets, bundle, cancel)
    }

    pub fn start_monitor(&self) -> Result<()> {
        for target in self.targets.iter().filter(|t| t.enabled) {
            if let Some(monitor) = target.target.monitor() {
                monitor.start_monitor()?;
            }
        }
        Ok(())
    }

    pub fn stop_monitor(&self) {
        for target in &self.targets {
            if let Some(monitor) = target.target.monitor() {
                monitor.stop_monitor();
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.targets
            .iter()
            .filter_map(|t| t.target.monitor())
            .any(|m| m.is_monitoring())
    }

    /// Serialize exports and imports of this profile.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

/// Maximum of the targets' local update times.
///
/// Stops at the first target that raises the context's cancel flag, so a
/// guard target placed before others can veto the whole profile.
pub(crate) async fn local_update_of(
    targets: &[&ProfileTarget],
    context: &SyncContext,
    cancel: &CancellationToken,
) -> Result<Option<DateTime<Utc>>> {
    let mut latest: Option<DateTime<Utc>> = None;
    for target in targets {
        check_cancelled(cancel)?;
        let update = target.target.last_update(context, cancel).await?;
        if context.is_processing_cancelled() {
            tracing::info!(target_id = %target.id, "Target requested to stop processing");
            break;
        }
        if let Some(update) = update.map(time::truncate_to_ticks) {
            tracing::trace!(target_id = %target.id, %update, "Local update time");
            latest = Some(latest.map_or(update, |l| l.max(update)));
        }
    }
    Ok(latest)
}

/// Maximum of the `last-update` metadata the bundle holds for `targets`.
pub(crate) fn bundle_update_of(
    targets: &[&ProfileTarget],
    bundle: &mut dyn Bundle,
    cancel: &CancellationToken,
) -> Result<Option<DateTime<Utc>>> {
    let mut latest: Option<DateTime<Utc>> = None;
    for target in targets {
        check_cancelled(cancel)?;
        let metadata = bundle.metadata(&target.id, cancel)?;
        if let Some(value) = metadata.get(KEY_LAST_UPDATE) {
            let update = time::parse_ticks(value)?;
            latest = Some(latest.map_or(update, |l| l.max(update)));
        }
    }
    Ok(latest)
}
