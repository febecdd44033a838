//! Template tokens in profile fields
//!
//! `${folder:Name}` expands to a well-known user directory and
//! `${env:NAME}` to an environment variable. Tokens that cannot be resolved
//! are errors; text outside tokens is copied unchanged.

use std::collections::HashMap;
use std::path::PathBuf;

use hostsync_core::{Error, Result, TokenResolver};

const TOKEN_START: &str = "${";
const TOKEN_END: char = '}';

/// Resolves `${folder:..}` and `${env:..}` tokens.
///
/// Lookups go to the real environment unless overridden, so tests and
/// embedding applications can pin values.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    folders: HashMap<String, PathBuf>,
    env: HashMap<String, String>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the directory returned for `${folder:name}`.
    pub fn with_folder(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.folders.insert(normalize_folder(name), path.into());
        self
    }

    /// Pin the value returned for `${env:name}`.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    fn folder(&self, name: &str) -> Result<PathBuf> {
        let key = normalize_folder(name);
        if let Some(path) = self.folders.get(&key) {
            return Ok(path.clone());
        }
        special_folder(&key).ok_or_else(|| Error::Template {
            token: format!("folder:{name}"),
            reason: "unknown or unavailable folder".to_string(),
        })
    }

    fn env_var(&self, name: &str) -> Result<String> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        std::env::var(name).map_err(|e| Error::Template {
            token: format!("env:{name}"),
            reason: e.to_string(),
        })
    }

    fn expand_token(&self, token: &str) -> Result<String> {
        let (kind, name) = token.split_once(':').ok_or_else(|| Error::Template {
            token: token.to_string(),
            reason: "expected 'kind:name'".to_string(),
        })?;
        let name = name.trim();
        match kind.trim().to_ascii_lowercase().as_str() {
            "folder" => Ok(self.folder(name)?.to_string_lossy().into_owned()),
            "env" => self.env_var(name),
            other => Err(Error::Template {
                token: token.to_string(),
                reason: format!("unknown token kind '{other}'"),
            }),
        }
    }
}

impl TokenResolver for TemplateEngine {
    fn resolve(&self, input: &str) -> Result<String> {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find(TOKEN_START) {
            output.push_str(&rest[..start]);
            let after = &rest[start + TOKEN_START.len()..];
            let end = after.find(TOKEN_END).ok_or_else(|| Error::Template {
                token: rest[start..].to_string(),
                reason: "unterminated token".to_string(),
            })?;
            output.push_str(&self.expand_token(&after[..end])?);
            rest = &after[end + 1..];
        }
        output.push_str(rest);
        Ok(output)
    }
}

fn normalize_folder(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn special_folder(key: &str) -> Option<PathBuf> {
    match key {
        "home" | "userprofile" => dirs::home_dir(),
        "config" | "appdata" | "applicationdata" => dirs::config_dir(),
        "localappdata" | "localapplicationdata" => dirs::data_local_dir(),
        "data" => dirs::data_dir(),
        "cache" => dirs::cache_dir(),
        "desktop" | "desktopdirectory" => dirs::desktop_dir(),
        "documents" | "mydocuments" | "personal" => dirs::document_dir(),
        "downloads" => dirs::download_dir(),
        "music" | "mymusic" => dirs::audio_dir(),
        "pictures" | "mypictures" => dirs::picture_dir(),
        "videos" | "myvideos" => dirs::video_dir(),
        "fonts" => dirs::font_dir(),
        "temp" | "tmp" => Some(std::env::temp_dir()),
        _ => None,
    }
}
