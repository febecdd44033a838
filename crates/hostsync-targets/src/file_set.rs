//! Resolution of a `files` list into concrete paths

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use hostsync_core::{Error, Result};
use hostsync_fs::{SlashPath, has_wildcards, wildcard_to_regex};
use regex::Regex;

/// Prefix marking a `files` entry as relative to the base path.
pub const BASE_RELATIVE_PREFIX: &str = "~/";

/// The files selected by a base path, a list of entries and exclusions.
///
/// An entry is one of:
/// - a rooted path to a file
/// - a rooted path to a directory, selecting the files directly inside it
/// - a rooted path whose last component holds `*` or `?` wildcards
///
/// Entries starting with `~/` are taken relative to the base path.
#[derive(Debug, Clone)]
pub struct FileSet {
    owner: String,
    base: PathBuf,
    entries: Vec<String>,
    skip_missing: bool,
    excludes: Vec<Regex>,
}

impl FileSet {
    pub fn new(
        owner: &str,
        base: impl Into<PathBuf>,
        entries: &[String],
        skip_missing: bool,
        exclude_patterns: &[String],
    ) -> Result<Self> {
        let excludes = exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| Error::target(owner, format!("invalid exclude pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            owner: owner.to_string(),
            base: base.into(),
            entries: entries.to_vec(),
            skip_missing,
            excludes,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Turn a `files` entry into an absolute path.
    pub fn expand(&self, entry: &str) -> Result<PathBuf> {
        let path = match entry.strip_prefix(BASE_RELATIVE_PREFIX) {
            Some(rest) => self.base.join(rest),
            None => PathBuf::from(entry),
        };
        if !path.is_absolute() {
            return Err(Error::target(
                &self.owner,
                format!("path '{entry}' must be rooted or start with '{BASE_RELATIVE_PREFIX}'"),
            ));
        }
        Ok(path)
    }

    /// Existing files selected by the entries, minus exclusions, in entry
    /// order. Files found through a directory or wildcard are sorted by name.
    pub fn resolve(&self) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for entry in &self.entries {
            for path in self.resolve_entry(entry)? {
                if self.is_excluded(&path) {
                    tracing::trace!(file = %path.display(), "Excluded");
                    continue;
                }
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }

    fn resolve_entry(&self, entry: &str) -> Result<Vec<PathBuf>> {
        let path = self.expand(entry)?;
        if has_wildcards(entry) {
            let pattern = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let regex = wildcard_to_regex(&pattern)?;
            let dir = path.parent().unwrap_or(&self.base);
            return Ok(list_files(dir, |name| regex.is_match(name)));
        }
        if path.is_dir() {
            return Ok(list_files(&path, |_| true));
        }
        if path.is_file() {
            return Ok(vec![path]);
        }
        if self.skip_missing {
            tracing::debug!(target_id = %self.owner, file = %path.display(), "Skipping missing file");
            Ok(Vec::new())
        } else {
            Err(Error::target(
                &self.owner,
                format!("file not found: {}", path.display()),
            ))
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let normalized = SlashPath::new(path);
        self.excludes.iter().any(|r| r.is_match(normalized.as_str()))
    }

    /// Name recorded for `path` in bundles: relative to the base path.
    pub fn relative_name(&self, path: &Path) -> Result<String> {
        SlashPath::new(path)
            .relative_to(&SlashPath::new(&self.base))
            .ok_or_else(|| {
                Error::target(
                    &self.owner,
                    format!(
                        "{} is not inside base path {}",
                        path.display(),
                        self.base.display()
                    ),
                )
            })
    }
}

/// Files directly inside `dir` whose names pass `keep`, sorted.
fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter(|e| keep(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}
