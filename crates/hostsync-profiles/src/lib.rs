//! Profile loading for hostsync
//!
//! Turns YAML profile documents into [`Profile`] object graphs:
//!
//! - [`loader`] builds profiles through an [`ElementRegistry`](hostsync_core::ElementRegistry)
//! - [`include`] splices `!include` references (files, http(s), `global://`)
//! - [`platform`] resolves `win:`/`linux:`/`macos:` qualified keys
//! - [`template`] expands `${folder:..}` and `${env:..}` tokens
//! - [`source`] enumerates documents from files, directories or memory

pub mod error;
pub mod filter;
pub mod include;
pub mod loader;
pub mod platform;
pub mod source;
pub mod template;

pub use error::{Error, Result};
pub use filter::ProfileFilter;
pub use include::IncludeResolver;
pub use loader::ProfileLoader;
pub use platform::Platform;
pub use source::{FilesProfileSource, ProfileDocument, ProfileSource, StreamProfileSource};
pub use template::TemplateEngine;

use std::collections::HashSet;

use hostsync_core::Profile;

/// What [`load_all`] does with a document that fails to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidDocuments {
    /// Log the failure and continue with the next document.
    #[default]
    Skip,
    /// Stop and return the failure.
    Abort,
}

/// Load every profile from `source`, in document order.
///
/// Excluded profiles are dropped, as is any profile whose id was already
/// loaded. Failures of the source itself always abort.
pub async fn load_all(
    loader: &ProfileLoader,
    source: &mut dyn ProfileSource,
    filter: &ProfileFilter,
    invalid: InvalidDocuments,
) -> Result<Vec<Profile>> {
    let mut profiles = Vec::new();
    let mut seen = HashSet::new();
    while let Some(document) = source.next().await? {
        let loaded = loader
            .load_str(&document.content, &document.origin, document.base_dir.as_deref())
            .await;
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) if invalid == InvalidDocuments::Skip && e.is_document_error() => {
                tracing::warn!(origin = %document.origin, error = %e, "Skipping profile document");
                continue;
            }
            Err(e) => return Err(e),
        };

        for profile in loaded {
            if filter.is_excluded(profile.id()) {
                tracing::debug!(profile = %profile.id(), "Profile excluded");
                continue;
            }
            if !seen.insert(profile.id().to_string()) {
                tracing::warn!(
                    profile = %profile.id(),
                    origin = %document.origin,
                    "Duplicate profile id, keeping the first"
                );
                continue;
            }
            profiles.push(profile);
        }
    }
    Ok(profiles)
}
