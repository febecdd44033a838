//! Configuration, profiles and bundle storage for one invocation

use std::path::PathBuf;
use std::sync::Arc;

use hostsync_bundles::ZipBundleFactory;
use hostsync_core::config::{BUNDLES_DIRECTORY_KEY, PROFILES_EXCLUDE_KEY, PROFILES_SOURCE_KEY};
use hostsync_core::{Profile, UserConfiguration};
use hostsync_profiles::{
    FilesProfileSource, IncludeResolver, InvalidDocuments, ProfileFilter, ProfileLoader, load_all,
};

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// The user configuration with command-line overrides applied.
pub fn configuration(cli: &Cli) -> Result<UserConfiguration> {
    let mut config = match &cli.config {
        Some(path) => UserConfiguration::load(Some(path.as_path()))?,
        None => match UserConfiguration::default_path() {
            Some(path) if path.is_file() => UserConfiguration::load(Some(path.as_path()))?,
            _ => UserConfiguration::default(),
        },
    };

    if !cli.profiles.is_empty() {
        config.set(PROFILES_SOURCE_KEY, join_list(&cli.profiles));
    }
    if let Some(bundles) = &cli.bundles {
        config.set(BUNDLES_DIRECTORY_KEY, bundles.to_string_lossy());
    }
    if !cli.exclude.is_empty() {
        let mut patterns = config.profiles_exclude();
        patterns.extend(cli.exclude.iter().cloned());
        config.set(PROFILES_EXCLUDE_KEY, patterns.join(","));
    }
    config.apply_defaults();
    Ok(config)
}

/// Quote each path so embedded commas survive list splitting.
fn join_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("\"{}\"", p.display()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Everything a command needs.
pub struct AppContext {
    pub config: UserConfiguration,
    pub profiles: Vec<Arc<Profile>>,
    pub factory: Arc<ZipBundleFactory>,
}

impl AppContext {
    pub async fn load(cli: &Cli, config: UserConfiguration) -> Result<Self> {
        let factory = Arc::new(ZipBundleFactory::new(config.bundles_directory()?));

        let mut includes = IncludeResolver::new();
        if let Some(url) = &cli.global_url {
            includes = includes.with_global_base(url.clone());
        }
        let loader = ProfileLoader::new(hostsync_targets::builtin_registry()).with_includes(includes);
        let filter = ProfileFilter::new(config.profiles_exclude().as_slice())?;
        let mut source = FilesProfileSource::new(config.profiles_sources()?);
        let profiles = load_all(&loader, &mut source, &filter, InvalidDocuments::Skip).await?;
        tracing::info!(count = profiles.len(), "Profiles loaded");

        Ok(Self {
            config,
            profiles: profiles.into_iter().map(Arc::new).collect(),
            factory,
        })
    }

    /// All profiles, or only `id` when given.
    pub fn select(&self, id: Option<&str>) -> Result<Vec<Arc<Profile>>> {
        match id {
            None => Ok(self.profiles.clone()),
            Some(id) => self
                .profiles
                .iter()
                .find(|p| p.id() == id)
                .map(|p| vec![Arc::clone(p)])
                .ok_or_else(|| CliError::user(format!("no profile with id '{id}'"))),
        }
    }
}
