//! `!include` expansion
//!
//! An element of the profile list tagged `!include` is replaced by the
//! profiles of the referenced document:
//!
//! ```yaml
//! - !include shared/editor.yaml
//! - !include https://example.com/profiles/terminal.yaml
//! - !include global://tools/git.yaml
//! - id: local
//!   name: Local profile
//!   targets: []
//! ```
//!
//! Relative local references resolve against the directory of the document
//! holding them. `global://` references resolve against a configurable base
//! URL.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde_yaml::Value;

use crate::{Error, Result};

/// Tag marking an include reference.
pub const INCLUDE_TAG: &str = "include";

/// Scheme of references resolved against the global base URL.
pub const GLOBAL_SCHEME: &str = "global://";

/// Nesting limit; deeper chains are treated as include cycles.
pub const MAX_INCLUDE_DEPTH: usize = 8;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where a referenced document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeRef {
    Url(String),
    File(PathBuf),
}

/// Fetches and splices included documents.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    global_base: Option<String>,
    client: reqwest::Client,
}

impl Default for IncludeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IncludeResolver {
    pub fn new() -> Self {
        Self {
            global_base: None,
            client: reqwest::Client::new(),
        }
    }

    /// Base URL for `global://` references.
    pub fn with_global_base(mut self, base: impl Into<String>) -> Self {
        self.global_base = Some(base.into());
        self
    }

    /// Classify `reference`, resolving relative paths against `base_dir`.
    pub fn locate(&self, reference: &str, base_dir: &Path) -> Result<IncludeRef> {
        let reference = reference.trim();
        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(IncludeRef::Url(reference.to_string()));
        }
        if lower.starts_with(GLOBAL_SCHEME) {
            let base = self.global_base.as_deref().ok_or_else(|| Error::Include {
                reference: reference.to_string(),
                message: "no base URL configured for global references".to_string(),
            })?;
            let path = reference[GLOBAL_SCHEME.len()..].trim_start_matches('/');
            return Ok(IncludeRef::Url(format!("{}/{}", base.trim_end_matches('/'), path)));
        }
        let path = Path::new(reference);
        Ok(IncludeRef::File(if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }))
    }

    async fn fetch(&self, location: &IncludeRef) -> Result<String> {
        match location {
            IncludeRef::Url(url) => {
                tracing::debug!(%url, "Downloading included profiles");
                let download = |source| Error::Download {
                    url: url.clone(),
                    source,
                };
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(download)?;
                response.text().await.map_err(download)
            }
            IncludeRef::File(path) => {
                tracing::debug!(file = %path.display(), "Reading included profiles");
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| hostsync_fs::Error::io(path, e).into())
            }
        }
    }

    /// Replace every include in `nodes` with the profiles it references,
    /// recursively.
    pub async fn expand(&self, nodes: Vec<Value>, base_dir: &Path) -> Result<Vec<Value>> {
        self.expand_at(nodes, base_dir.to_path_buf(), 0).await
    }

    fn expand_at(&self, nodes: Vec<Value>, base_dir: PathBuf, depth: usize) -> BoxFuture<'_, Result<Vec<Value>>> {
        Box::pin(async move {
            let mut expanded = Vec::with_capacity(nodes.len());
            for node in nodes {
                let Some(reference) = include_reference(&node)? else {
                    expanded.push(node);
                    continue;
                };
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(Error::IncludeDepth {
                        reference,
                        limit: MAX_INCLUDE_DEPTH,
                    });
                }

                let location = self.locate(&reference, &base_dir)?;
                let content = self.fetch(&location).await?;
                let document: Value = serde_yaml::from_str(&content).map_err(|source| Error::Yaml {
                    origin: reference.clone(),
                    source,
                })?;
                let nested_base = match &location {
                    IncludeRef::File(path) => path.parent().map(Path::to_path_buf).unwrap_or_else(|| base_dir.clone()),
                    IncludeRef::Url(_) => base_dir.clone(),
                };
                let children = self.expand_at(profile_nodes(document), nested_base, depth + 1).await?;
                tracing::debug!(%reference, profiles = children.len(), "Included profiles");
                expanded.extend(children);
            }
            Ok(expanded)
        })
    }
}

/// The profile nodes of a document: a sequence holds many, a mapping is one,
/// an empty document none.
pub fn profile_nodes(document: Value) -> Vec<Value> {
    match document {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items,
        other => vec![other],
    }
}

fn include_reference(node: &Value) -> Result<Option<String>> {
    let Value::Tagged(tagged) = node else {
        return Ok(None);
    };
    if tagged.tag != INCLUDE_TAG {
        return Ok(None);
    }
    match tagged.value.as_str() {
        Some(reference) if !reference.trim().is_empty() => Ok(Some(reference.to_string())),
        _ => Err(Error::Include {
            reference: format!("{:?}", tagged.value),
            message: "include reference must be a non-empty string".to_string(),
        }),
    }
}
