//! Where profile documents come from
//!
//! A [`ProfileSource`] hands out documents one at a time until it runs dry.
//! The loader does not care whether they were read from disk or built in
//! memory.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{Error, Result};

/// Extension of profile documents found in directories.
pub const PROFILE_EXTENSION: &str = "yaml";

/// One profile document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDocument {
    /// File path or label, for logs and errors.
    pub origin: String,
    pub content: String,
    /// Directory relative includes resolve against.
    pub base_dir: Option<PathBuf>,
}

/// "Next document or end" enumeration of profile documents.
#[async_trait]
pub trait ProfileSource: Send {
    async fn next(&mut self) -> Result<Option<ProfileDocument>>;
}

/// Documents read from files and directories.
///
/// A directory contributes its non-hidden `*.yaml` files in name order; a
/// file contributes itself. Sources are listed on the first call to
/// [`next`](ProfileSource::next), which fails if one of them is missing.
#[derive(Debug)]
pub struct FilesProfileSource {
    sources: Vec<PathBuf>,
    pending: Option<VecDeque<PathBuf>>,
}

impl FilesProfileSource {
    pub fn new(sources: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            pending: None,
        }
    }

    /// The files this source will read, in order.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for source in &self.sources {
            if source.is_dir() {
                files.extend(list_profile_files(source)?);
            } else if source.is_file() {
                files.push(source.clone());
            } else {
                return Err(Error::SourceNotFound {
                    path: source.clone(),
                });
            }
        }
        Ok(files)
    }
}

fn list_profile_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| hostsync_fs::Error::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == PROFILE_EXTENSION))
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| !name.to_string_lossy().starts_with('.'))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[async_trait]
impl ProfileSource for FilesProfileSource {
    async fn next(&mut self) -> Result<Option<ProfileDocument>> {
        if self.pending.is_none() {
            self.pending = Some(self.list_files()?.into());
        }
        let Some(path) = self.pending.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        tracing::trace!(file = %path.display(), "Reading profile document");
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| hostsync_fs::Error::io(&path, e))?;
        // Includes resolve against the real location of symlinked documents.
        let resolved = hostsync_fs::path::canonical(&path)?;
        Ok(Some(ProfileDocument {
            origin: path.display().to_string(),
            content,
            base_dir: resolved.parent().map(Path::to_path_buf),
        }))
    }
}

/// Documents held in memory.
#[derive(Debug, Default)]
pub struct StreamProfileSource {
    documents: VecDeque<ProfileDocument>,
}

impl StreamProfileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document labelled `origin`.
    pub fn push(&mut self, origin: impl Into<String>, content: impl Into<String>) {
        self.documents.push_back(ProfileDocument {
            origin: origin.into(),
            content: content.into(),
            base_dir: None,
        });
    }

    pub fn with_document(mut self, origin: impl Into<String>, content: impl Into<String>) -> Self {
        self.push(origin, content);
        self
    }
}

#[async_trait]
impl ProfileSource for StreamProfileSource {
    async fn next(&mut self) -> Result<Option<ProfileDocument>> {
        Ok(self.documents.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn directories_yield_visible_yaml_files_in_order() {
        let temp = TempDir::new().unwrap();
        for name in ["b.yaml", "a.yaml", ".hidden.yaml", "notes.txt", "c.yml"] {
            std::fs::write(temp.path().join(name), name).unwrap();
        }
        let extra = temp.path().join("notes.txt");

        let mut source = FilesProfileSource::new([temp.path().to_path_buf(), extra]);
        let mut origins = Vec::new();
        while let Some(document) = source.next().await.unwrap() {
            origins.push(document.content);
        }

        assert_eq!(origins, vec!["a.yaml", "b.yaml", "notes.txt"]);
    }

    #[tokio::test]
    async fn missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let mut source = FilesProfileSource::new([temp.path().join("absent")]);
        assert!(matches!(
            source.next().await,
            Err(Error::SourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stream_source_returns_documents_once() {
        let mut source = StreamProfileSource::new().with_document("one", "a").with_document("two", "b");
        assert_eq!(source.next().await.unwrap().unwrap().origin, "one");
        assert_eq!(source.next().await.unwrap().unwrap().origin, "two");
        assert!(source.next().await.unwrap().is_none());
    }
}
