//! User configuration
//!
//! A flat string map read from a YAML file. Keys:
//!
//! - `profiles-source`: comma-separated profile files or directories
//! - `bundles-directory`: where bundles are stored
//! - `profiles-exclude`: comma-separated wildcard patterns over profile ids
//! - `log-file`: optional log destination
//! - `disable-import` / `disable-export`: monitor mode switches

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const PROFILES_SOURCE_KEY: &str = "profiles-source";
pub const BUNDLES_DIRECTORY_KEY: &str = "bundles-directory";
pub const PROFILES_EXCLUDE_KEY: &str = "profiles-exclude";
pub const LOG_FILE_KEY: &str = "log-file";
pub const DISABLE_IMPORT_KEY: &str = "disable-import";
pub const DISABLE_EXPORT_KEY: &str = "disable-export";

const CONFIG_DIR: &str = "hostsync";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConfiguration {
    values: BTreeMap<String, String>,
    file: Option<PathBuf>,
}

impl UserConfiguration {
    /// Default configuration file location inside the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()
                .ok_or_else(|| Error::config("cannot determine the user configuration directory"))?,
        };
        if !path.is_file() {
            return Err(Error::config(format!(
                "cannot find config file {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path).map_err(|e| hostsync_fs::Error::io(&path, e))?;
        let mut config = Self::parse(&content)?;
        config.file = Some(path);
        Ok(config)
    }

    /// Parse a YAML mapping of scalar values.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: Option<BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(content)?;
        let mut values = BTreeMap::new();
        for (key, value) in raw.unwrap_or_default() {
            let text = match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                _ => {
                    return Err(Error::config(format!("key '{}' must be a scalar value", key)));
                }
            };
            values.insert(key, text);
        }
        Ok(Self { values, file: None })
    }

    pub fn from_map<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            file: None,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("cannot find key {}", key)))
    }

    /// Profile files or directories to load.
    pub fn profiles_sources(&self) -> Result<Vec<PathBuf>> {
        let sources: Vec<PathBuf> = split_list(self.require(PROFILES_SOURCE_KEY)?)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        if sources.is_empty() {
            return Err(Error::config(format!("{} is empty", PROFILES_SOURCE_KEY)));
        }
        Ok(sources)
    }

    pub fn bundles_directory(&self) -> Result<PathBuf> {
        self.require(BUNDLES_DIRECTORY_KEY).map(PathBuf::from)
    }

    pub fn profiles_exclude(&self) -> Vec<String> {
        self.get(PROFILES_EXCLUDE_KEY)
            .map(split_list)
            .unwrap_or_default()
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.get(LOG_FILE_KEY).map(PathBuf::from)
    }

    pub fn disable_import(&self) -> bool {
        self.flag(DISABLE_IMPORT_KEY)
    }

    pub fn disable_export(&self) -> bool {
        self.flag(DISABLE_EXPORT_KEY)
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "on")
        })
    }

    /// Fill in `bundles-directory` when missing: the config file's directory
    /// first, then the directory of the first profiles source.
    pub fn apply_defaults(&mut self) {
        if self.get(BUNDLES_DIRECTORY_KEY).is_some() {
            return;
        }
        let from_file = self
            .file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let from_source = || {
            self.get(PROFILES_SOURCE_KEY)
                .and_then(|s| split_list(s).into_iter().next())
                .and_then(|first| Path::new(&first).parent().map(Path::to_path_buf))
        };
        if let Some(dir) = from_file.or_else(from_source) {
            if !dir.as_os_str().is_empty() {
                self.set(BUNDLES_DIRECTORY_KEY, dir.to_string_lossy());
            }
        }
    }
}

/// Split a comma-separated list. Double quotes protect embedded commas.
pub fn split_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                push_trimmed(&mut items, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_trimmed(&mut items, &current);
    items
}

fn push_trimmed(items: &mut Vec<String>, value: &str) {
    let trimmed = value.trim();
    if !trimmed.is_empty() {
        items.push(trimmed.to_string());
    }
}
