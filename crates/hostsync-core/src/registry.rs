//! Element registry for polymorphic target and condition construction
//!
//! Profile documents select an implementation through a `type` tag. The
//! registry maps normalized tags to deserializing factories; it is built
//! explicitly and handed to the loader.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::condition::Condition;
use crate::error::ElementKind;
use crate::target::Target;
use crate::{Error, Result};

pub type TargetFactory = fn(serde_yaml::Value) -> Result<Box<dyn Target>>;
pub type ConditionFactory = fn(serde_yaml::Value) -> Result<Box<dyn Condition>>;

/// Registry mapping type tags to target and condition factories.
///
/// # Example
///
/// ```ignore
/// let mut registry = ElementRegistry::new();
/// registry.register_target::<FilesTarget>("files");
/// let target = registry.create_target("Files", fields)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    targets: HashMap<String, TargetFactory>,
    conditions: HashMap<String, ConditionFactory>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target type. A later registration for the same tag wins.
    pub fn register_target<T>(&mut self, type_name: &str)
    where
        T: Target + DeserializeOwned + 'static,
    {
        self.targets
            .insert(normalize_type_name(type_name), build_target::<T>);
    }

    /// Register a condition type. A later registration for the same tag wins.
    pub fn register_condition<C>(&mut self, type_name: &str)
    where
        C: Condition + DeserializeOwned + 'static,
    {
        self.conditions
            .insert(normalize_type_name(type_name), build_condition::<C>);
    }

    /// Build a target of type `type_name` from its remaining document fields.
    pub fn create_target(&self, type_name: &str, fields: serde_yaml::Value) -> Result<Box<dyn Target>> {
        let factory = lookup(&self.targets, type_name, "target").ok_or_else(|| {
            Error::UnknownType {
                kind: ElementKind::Target,
                type_name: type_name.to_string(),
            }
        })?;
        factory(fields)
    }

    /// Build a condition of type `type_name` from its remaining document fields.
    pub fn create_condition(
        &self,
        type_name: &str,
        fields: serde_yaml::Value,
    ) -> Result<Box<dyn Condition>> {
        let factory = lookup(&self.conditions, type_name, "condition").ok_or_else(|| {
            Error::UnknownType {
                kind: ElementKind::Condition,
                type_name: type_name.to_string(),
            }
        })?;
        factory(fields)
    }

    pub fn has_target(&self, type_name: &str) -> bool {
        lookup(&self.targets, type_name, "target").is_some()
    }

    pub fn has_condition(&self, type_name: &str) -> bool {
        lookup(&self.conditions, type_name, "condition").is_some()
    }

    /// Registered target tags, sorted.
    pub fn target_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Registered condition tags, sorted.
    pub fn condition_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Lower-case and strip separators, so `Stop-If-Files-Not-Exist`,
/// `stop_if_files_not_exist` and `stopiffilesnotexist` are the same tag.
pub fn normalize_type_name(type_name: &str) -> String {
    type_name
        .chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Accepts the tag with or without its kind suffix (`files` / `files-target`).
fn lookup<F: Copy>(map: &HashMap<String, F>, type_name: &str, suffix: &str) -> Option<F> {
    let normalized = normalize_type_name(type_name);
    map.get(&normalized).copied().or_else(|| {
        normalized
            .strip_suffix(suffix)
            .and_then(|stripped| map.get(stripped).copied())
    })
}

fn build_target<T>(fields: serde_yaml::Value) -> Result<Box<dyn Target>>
where
    T: Target + DeserializeOwned + 'static,
{
    let target: T = serde_yaml::from_value(fields)?;
    Ok(Box::new(target))
}

fn build_condition<C>(fields: serde_yaml::Value) -> Result<Box<dyn Condition>>
where
    C: Condition + DeserializeOwned + 'static,
{
    let condition: C = serde_yaml::from_value(fields)?;
    Ok(Box::new(condition))
}
