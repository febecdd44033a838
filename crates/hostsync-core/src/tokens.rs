//! Token substitution seam
//!
//! Targets and conditions declare which of their fields take templates by
//! passing them through a [`TokenResolver`] in their `substitute` method.

use crate::Result;

/// Expands template tokens inside a string.
pub trait TokenResolver: Send + Sync {
    fn resolve(&self, input: &str) -> Result<String>;

    fn resolve_in_place(&self, value: &mut String) -> Result<()> {
        *value = self.resolve(value)?;
        Ok(())
    }

    fn resolve_all(&self, values: &mut [String]) -> Result<()> {
        for value in values.iter_mut() {
            self.resolve_in_place(value)?;
        }
        Ok(())
    }
}

/// Resolver that leaves every string untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokens;

impl TokenResolver for NoTokens {
    fn resolve(&self, input: &str) -> Result<String> {
        Ok(input.to_string())
    }
}
