//! Profile documents to [`Profile`] object graphs
//!
//! A document holds one profile (a mapping) or many (a sequence):
//!
//! ```yaml
//! id: editor
//! name: Editor settings
//! description: Keybindings and preferences
//! targets:
//!   - type: stop-if-directories-not-exist
//!     directories: ["${folder:AppData}/Editor"]
//!   - id: user
//!     type: files
//!     base-path: ${folder:AppData}/Editor/User
//!     files: ["~/settings.json", "~/keybindings.json"]
//!     conditions:
//!       - type: check-files-existence
//!         files: ["${folder:AppData}/Editor/User/settings.json"]
//! ```
//!
//! Loading runs, in order: include expansion, platform key resolution,
//! element construction through the [`ElementRegistry`], token substitution
//! and validation. Any failure rejects the whole document.

use std::path::{Path, PathBuf};

use hostsync_core::{
    Condition, ElementRegistry, Error as CoreError, Profile, ProfileTarget, Target, TokenResolver,
};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::include::{IncludeResolver, profile_nodes};
use crate::platform::{Platform, resolve_platform_keys};
use crate::template::TemplateEngine;
use crate::{Error, Result};

const TARGETS_KEY: &str = "targets";
const CONDITIONS_KEY: &str = "conditions";
const TYPE_KEY: &str = "type";
const ID_KEY: &str = "id";
const ENABLED_KEY: &str = "enabled";

/// Profile fields read before its targets.
#[derive(Debug, Default, Deserialize)]
struct ProfileHeader {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// Builds profiles from YAML documents.
pub struct ProfileLoader {
    registry: ElementRegistry,
    tokens: Box<dyn TokenResolver>,
    includes: IncludeResolver,
    platform: Platform,
    base_dir: PathBuf,
}

impl ProfileLoader {
    /// A loader for the platform this process runs on, with the default
    /// [`TemplateEngine`] and relative includes resolved against the
    /// working directory.
    pub fn new(registry: ElementRegistry) -> Self {
        Self {
            registry,
            tokens: Box::new(TemplateEngine::new()),
            includes: IncludeResolver::new(),
            platform: Platform::current(),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_tokens(mut self, tokens: impl TokenResolver + 'static) -> Self {
        self.tokens = Box::new(tokens);
        self
    }

    pub fn with_includes(mut self, includes: IncludeResolver) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Directory that relative includes of in-memory documents resolve against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Load the profiles of one document.
    ///
    /// `origin` names the document in errors and logs; `base_dir` overrides
    /// the loader's include directory for this document.
    pub async fn load_str(
        &self,
        content: &str,
        origin: &str,
        base_dir: Option<&Path>,
    ) -> Result<Vec<Profile>> {
        let document: Value = serde_yaml::from_str(content).map_err(|source| Error::Yaml {
            origin: origin.to_string(),
            source,
        })?;
        let base_dir = base_dir.unwrap_or(&self.base_dir);
        let nodes = self.includes.expand(profile_nodes(document), base_dir).await?;

        let mut profiles = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            resolve_platform_keys(&mut node, &self.platform);
            let profile = self.build_profile(node)?;
            tracing::info!(
                profile = %profile.id(),
                targets = profile.targets().len(),
                %origin,
                "Loaded profile"
            );
            profiles.push(profile);
        }
        Ok(profiles)
    }

    /// Load the profiles of a YAML file; relative includes resolve against
    /// the file's directory.
    pub async fn load_file(&self, path: &Path) -> Result<Vec<Profile>> {
        tracing::debug!(file = %path.display(), "Loading profiles");
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| hostsync_fs::Error::io(path, e))?;
        let base = path.parent().unwrap_or(&self.base_dir);
        self.load_str(&content, &path.display().to_string(), Some(base))
            .await
    }

    fn build_profile(&self, node: Value) -> Result<Profile> {
        let Value::Mapping(mut mapping) = node else {
            return Err(CoreError::parse("a profile must be a mapping").into());
        };
        let targets = mapping.remove(TARGETS_KEY);

        let header: ProfileHeader =
            serde_yaml::from_value(Value::Mapping(mapping)).map_err(CoreError::from)?;
        let mut profile = Profile::new(header.id.clone(), header.name);
        if let Some(mut description) = header.description {
            self.tokens.resolve_in_place(&mut description)?;
            profile = profile.with_description(description);
        }

        let Some(Value::Sequence(targets)) = targets else {
            return Err(CoreError::MissingTargets { profile: header.id }.into());
        };
        for (index, node) in targets.into_iter().enumerate() {
            profile.add_target(self.build_target(node, index)?);
        }

        profile.validate_targets()?;
        Ok(profile)
    }

    fn build_target(&self, node: Value, index: usize) -> Result<ProfileTarget> {
        let mut element = Element::split(node, "target", index)?;
        let enabled = match element.fields.remove(ENABLED_KEY) {
            None | Some(Value::Null) => true,
            Some(Value::Bool(enabled)) => enabled,
            Some(other) => {
                return Err(CoreError::parse(format!(
                    "target '{}': 'enabled' must be a boolean, found {other:?}",
                    element.id
                ))
                .into());
            }
        };
        let conditions = match element.fields.remove(CONDITIONS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(conditions)) => conditions,
            Some(_) => {
                return Err(CoreError::parse(format!(
                    "target '{}': 'conditions' must be a list",
                    element.id
                ))
                .into());
            }
        };

        let mut target: Box<dyn Target> = self
            .registry
            .create_target(&element.type_name, Value::Mapping(element.fields))?;
        target.substitute(self.tokens.as_ref())?;

        let mut profile_target = ProfileTarget::new(element.id, target).enabled(enabled);
        for (index, node) in conditions.into_iter().enumerate() {
            let element = Element::split(node, "condition", index)?;
            let mut condition: Box<dyn Condition> = self
                .registry
                .create_condition(&element.type_name, Value::Mapping(element.fields))?;
            condition.substitute(self.tokens.as_ref())?;
            profile_target = profile_target.with_condition(element.id, condition);
        }
        Ok(profile_target)
    }
}

/// A target or condition node split into its identity and its own fields.
struct Element {
    id: String,
    type_name: String,
    fields: Mapping,
}

impl Element {
    fn split(node: Value, kind: &str, index: usize) -> Result<Self> {
        let Value::Mapping(mut fields) = node else {
            return Err(CoreError::parse(format!("{kind} #{index} must be a mapping")).into());
        };
        let type_name = match fields.remove(TYPE_KEY) {
            Some(Value::String(type_name)) if !type_name.trim().is_empty() => type_name,
            _ => {
                return Err(
                    CoreError::parse(format!("{kind} #{index} does not declare a type")).into(),
                );
            }
        };
        let id = match fields.remove(ID_KEY) {
            None | Some(Value::Null) => format!("{index:03}"),
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            Some(other) => {
                return Err(
                    CoreError::parse(format!("{kind} #{index} has an invalid id {other:?}")).into(),
                );
            }
        };
        Ok(Self {
            id,
            type_name,
            fields,
        })
    }
}
