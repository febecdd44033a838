//! Shell-style wildcard matching (`*` and `?`)

use regex::Regex;

use crate::{Error, Result};

/// Whether the last component of `path` contains wildcard characters.
pub fn has_wildcards(path: &str) -> bool {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.contains('*') || name.contains('?')
}

/// Compile a wildcard pattern into an anchored regex.
///
/// `*` matches any run of characters and `?` matches exactly one. Matching
/// is case-insensitive on Windows, where file names are too.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    let flags = if cfg!(windows) { "(?i)" } else { "" };
    Regex::new(&format!("{}^{}$", flags, escaped)).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
