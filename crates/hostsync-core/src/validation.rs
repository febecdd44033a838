//! Aggregated field validation

use std::fmt;

use crate::{Error, Result};

/// A single violated field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// All violations found while validating an object graph.
///
/// Violations are collected rather than reported one at a time, so users
/// can fix every problem in a profile in a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Record a violation when `value` is blank.
    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        }
    }

    /// Record a violation when `values` is empty.
    pub fn required_list(&mut self, field: &str, values: &[String]) {
        if values.is_empty() {
            self.add(field, "is required");
        }
    }

    /// Merge `other`, prefixing its field names.
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        self.errors
            .extend(other.errors.into_iter().map(|e| ValidationError {
                field: format!("{}.{}", prefix, e.field),
                message: e.message,
            }));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Convert into `Err(Error::Validation)` when any violation was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}
