//! Settings: the unit of exported content

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::time;

/// Metadata key holding the tick timestamp of a setting or target.
pub const KEY_LAST_UPDATE: &str = "last-update";
/// Metadata key holding the relative name of an exported file.
pub const KEY_NAME: &str = "name";
/// Target metadata key holding the target type name.
pub const KEY_TYPE: &str = "type";
/// Profile metadata key holding the exporting host.
pub const KEY_HOSTNAME: &str = "hostname";
/// Setting metadata key holding the content checksum.
pub const KEY_CHECKSUM: &str = "checksum";

/// Where a setting's bytes come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SettingContent {
    /// No content; the "target produced nothing" sentinel.
    #[default]
    Empty,
    /// Content streamed from a local file when written into a bundle.
    File(PathBuf),
    /// Content held in memory, as read back from a bundle.
    Bytes(Vec<u8>),
}

impl SettingContent {
    /// Open a reader over the content.
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(match self {
            Self::Empty => Box::new(io::empty()),
            Self::File(path) => Box::new(File::open(path)?),
            Self::Bytes(bytes) => Box::new(bytes.as_slice()),
        })
    }
}

/// One exported content unit plus its string metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Setting {
    pub id: Option<String>,
    pub content: SettingContent,
    pub metadata: BTreeMap<String, String>,
}

impl Setting {
    /// The sentinel a target emits when it has nothing to store.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            content: SettingContent::File(path.into()),
            ..Self::default()
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            content: SettingContent::Bytes(bytes),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content == SettingContent::Empty
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The `last-update` metadata as a UTC instant, if present.
    pub fn last_update(&self) -> Result<Option<DateTime<Utc>>> {
        self.metadata(KEY_LAST_UPDATE)
            .map(time::parse_ticks)
            .transpose()
    }
}
