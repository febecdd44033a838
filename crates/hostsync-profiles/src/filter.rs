//! Exclusion of profiles by id

use hostsync_fs::wildcard_to_regex;
use regex::Regex;

use crate::Result;

/// Wildcard patterns (`*`, `?`) over profile ids, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    patterns: Vec<Regex>,
}

impl ProfileFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| wildcard_to_regex(&p.to_lowercase()))
            .collect::<hostsync_fs::Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, profile_id: &str) -> bool {
        let id = profile_id.to_lowercase();
        self.patterns.iter().any(|p| p.is_match(&id))
    }
}
