//! Path helpers shared by targets and bundles

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// A path spelled with forward slashes.
///
/// Bundle entry names and exclude patterns always see `/`, whatever the
/// host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlashPath(String);

impl SlashPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `self` relative to `base`, or `None` when it is not strictly below it.
    ///
    /// Direct children get a `./` prefix (`./file.txt`); deeper entries keep
    /// the plain form (`sub/file.txt`).
    pub fn relative_to(&self, base: &SlashPath) -> Option<String> {
        let rest = self
            .0
            .strip_prefix(base.0.trim_end_matches('/'))?
            .strip_prefix('/')?;
        match rest {
            "" => None,
            nested if nested.contains('/') => Some(nested.to_string()),
            child => Some(format!("./{child}")),
        }
    }
}

impl std::fmt::Display for SlashPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate that `value` can be used as a single file-name component.
///
/// Profile ids end up in bundle file names, so they must not contain
/// separators, parent references or characters that are reserved on
/// common filesystems.
pub fn validate_path_identifier(value: &str, what: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        what: what.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(invalid("must not be a relative directory reference"));
    }
    if value.starts_with('.') {
        return Err(invalid("must not start with a dot"));
    }
    const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '@'];
    if let Some(c) = value
        .chars()
        .find(|c| RESERVED.contains(c) || c.is_control())
    {
        return Err(invalid(&format!("contains reserved character {:?}", c)));
    }
    Ok(())
}

/// Join `relative` onto `base`, refusing results that leave `base`.
///
/// The check is lexical so it also works for files that do not exist yet.
pub fn join_within(base: &Path, relative: &str) -> Result<PathBuf> {
    let relative = relative.replace('\\', "/");
    let mut joined = base.to_path_buf();
    for component in Path::new(&relative).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => joined.push(part),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathEscapesBase {
                    path: PathBuf::from(relative),
                    base: base.to_path_buf(),
                });
            }
        }
    }
    Ok(joined)
}

/// Canonicalize a path without the `\\?\` prefix on Windows.
pub fn canonical(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).map_err(|e| Error::io(path, e))
}
