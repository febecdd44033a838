//! A bundle stored as one zip archive

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use hostsync_core::setting::KEY_CHECKSUM;
use hostsync_core::{Bundle, Error, Result, Setting, SettingContent, check_cancelled};
use hostsync_fs::checksum::{HashingWriter, compute_checksum};
use hostsync_fs::io::StagedFile;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::layout;

/// Upper bound on the buffer reserved up front for an entry. The size in the
/// archive header is untrusted; larger entries grow the buffer as they read.
const MAX_PREALLOCATION: u64 = 1 << 20;

// Field order matters: the writer must release the file before the
// staged file removes it.
enum Mode {
    Write {
        writer: ZipWriter<File>,
        groups: HashMap<String, u32>,
        staged: StagedFile,
    },
    Read {
        archive: ZipArchive<File>,
        names: Vec<String>,
    },
}

/// A bundle backed by a zip file.
///
/// Created bundles are written to a hidden staging file next to their final
/// location and only appear under their real name once [`close`](Bundle::close)
/// succeeds. A created bundle that is dropped unclosed leaves nothing behind.
pub struct ZipBundle {
    id: String,
    path: PathBuf,
    mode: Mode,
}

impl ZipBundle {
    /// Start writing a new bundle that will be stored at `path`.
    pub fn create(id: impl Into<String>, path: &Path) -> Result<Self> {
        let id = id.into();
        let (staged, file) = StagedFile::create(path)?;
        tracing::debug!(bundle = %id, staging = %staged.temp_path().display(), "Writing bundle");
        Ok(Self {
            id,
            path: path.to_path_buf(),
            mode: Mode::Write {
                writer: ZipWriter::new(file),
                groups: HashMap::new(),
                staged,
            },
        })
    }

    /// Open the bundle stored at `path` for reading.
    pub fn open(id: impl Into<String>, path: &Path) -> Result<Self> {
        let id = id.into();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::BundleNotFound { id: id.clone() },
            _ => hostsync_fs::Error::io(path, e).into(),
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| archive_error(&id, e))?;
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|e| archive_error(&id, e))?;
            names.push(entry.name().to_string());
        }
        Ok(Self {
            id,
            path: path.to_path_buf(),
            mode: Mode::Read { archive, names },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<(&mut ZipWriter<File>, &mut HashMap<String, u32>)> {
        match &mut self.mode {
            Mode::Write { writer, groups, .. } => Ok((writer, groups)),
            Mode::Read { .. } => Err(Error::BundleMode {
                bundle: self.id.clone(),
                expected: "write",
            }),
        }
    }

    fn reader(&mut self) -> Result<(&mut ZipArchive<File>, &[String])> {
        match &mut self.mode {
            Mode::Read { archive, names } => Ok((archive, names.as_slice())),
            Mode::Write { .. } => Err(Error::BundleMode {
                bundle: self.id.clone(),
                expected: "read",
            }),
        }
    }

    fn check_id(&self, what: &str, value: &str) -> Result<()> {
        layout::check_component(value).map_err(|reason| Error::Archive {
            bundle: self.id.clone(),
            message: format!("invalid {what} '{value}': {reason}"),
        })
    }
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
}

fn archive_error(bundle: &str, e: impl std::fmt::Display) -> Error {
    Error::Archive {
        bundle: bundle.to_string(),
        message: e.to_string(),
    }
}

fn write_entry(
    writer: &mut ZipWriter<File>,
    bundle: &str,
    name: &str,
    value: &str,
) -> Result<()> {
    writer
        .start_file(name, options())
        .map_err(|e| archive_error(bundle, e))?;
    writer
        .write_all(value.as_bytes())
        .map_err(|e| archive_error(bundle, e))
}

fn read_entry(archive: &mut ZipArchive<File>, bundle: &str, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => Error::EntryNotFound {
            bundle: bundle.to_string(),
            entry: name.to_string(),
        },
        other => archive_error(bundle, other),
    })?;
    let mut bytes = Vec::with_capacity(capacity_hint(entry.size()));
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| archive_error(bundle, e))?;
    Ok(bytes)
}

fn capacity_hint(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATION)).unwrap_or(0)
}

fn read_text(archive: &mut ZipArchive<File>, bundle: &str, name: &str) -> Result<String> {
    let bytes = read_entry(archive, bundle, name)?;
    String::from_utf8(bytes).map_err(|_| Error::BundleIntegrity {
        bundle: bundle.to_string(),
        message: format!("entry '{name}' is not valid UTF-8"),
    })
}

/// Entries of one setting collected while scanning the archive.
struct PendingSetting {
    setting_id: String,
    content: Option<String>,
    metadata: Vec<(String, String)>,
}

impl Bundle for ZipBundle {
    fn id(&self) -> &str {
        &self.id
    }

    fn put_setting(
        &mut self,
        target_id: &str,
        setting: &Setting,
        cancel: &CancellationToken,
    ) -> Result<String> {
        check_cancelled(cancel)?;
        self.check_id("target id", target_id)?;
        let setting_id = setting.id.as_deref().unwrap_or_default();
        self.check_id("setting id", setting_id)?;

        let bundle = self.id.clone();
        let (writer, groups) = self.writer()?;
        let group = groups.get(target_id).copied().unwrap_or(0);
        let name = layout::content_entry(target_id, group, setting_id);

        writer
            .start_file(name.as_str(), options())
            .map_err(|e| archive_error(&bundle, e))?;
        let mut hashing = HashingWriter::new(&mut *writer);
        let mut reader = match &setting.content {
            SettingContent::File(path) => setting
                .content
                .open()
                .map_err(|e| Error::from(hostsync_fs::Error::io(path, e)))?,
            _ => setting.content.open()?,
        };
        io::copy(&mut reader, &mut hashing).map_err(|e| archive_error(&bundle, e))?;
        let checksum = hashing.finish();

        let mut metadata = setting.metadata.clone();
        metadata.insert(KEY_CHECKSUM.to_string(), checksum);
        for (key, value) in &metadata {
            check_cancelled(cancel)?;
            write_entry(writer, &bundle, &layout::setting_metadata_entry(&name, key), value)?;
        }
        tracing::trace!(bundle = %bundle, entry = %name, "Stored setting");
        Ok(name)
    }

    fn put_metadata(
        &mut self,
        target_id: &str,
        metadata: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !target_id.is_empty() {
            self.check_id("target id", target_id)?;
        }
        let bundle = self.id.clone();
        let (writer, groups) = self.writer()?;
        for (key, value) in metadata {
            check_cancelled(cancel)?;
            write_entry(writer, &bundle, &layout::metadata_entry(target_id, key), value)?;
        }
        if !target_id.is_empty() {
            *groups.entry(target_id.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    fn settings(&mut self, target_id: &str, cancel: &CancellationToken) -> Result<Vec<Setting>> {
        let bundle = self.id.clone();
        let (archive, names) = self.reader()?;

        let mut pending: Vec<PendingSetting> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for name in names {
            let Some(entry) = layout::parse_setting_entry(name, target_id) else {
                continue;
            };
            let slot = *index.entry(entry.address).or_insert_with(|| {
                pending.push(PendingSetting {
                    setting_id: entry.setting_id.to_string(),
                    content: None,
                    metadata: Vec::new(),
                });
                pending.len() - 1
            });
            match entry.key {
                None => pending[slot].content = Some(name.clone()),
                Some(key) => pending[slot].metadata.push((key.to_string(), name.clone())),
            }
        }

        let mut settings = Vec::with_capacity(pending.len());
        for item in pending {
            check_cancelled(cancel)?;
            let Some(content_name) = item.content else {
                return Err(Error::BundleIntegrity {
                    bundle,
                    message: format!(
                        "setting '{}' of target '{}' has metadata but no content",
                        item.setting_id, target_id
                    ),
                });
            };
            let bytes = read_entry(archive, &bundle, &content_name)?;
            let mut metadata = BTreeMap::new();
            for (key, entry_name) in item.metadata {
                metadata.insert(key, read_text(archive, &bundle, &entry_name)?);
            }
            if let Some(expected) = metadata.get(KEY_CHECKSUM) {
                if *expected != compute_checksum(&bytes) {
                    return Err(Error::BundleIntegrity {
                        bundle,
                        message: format!("checksum mismatch for entry '{content_name}'"),
                    });
                }
            }
            settings.push(Setting {
                id: Some(item.setting_id),
                content: SettingContent::Bytes(bytes),
                metadata,
            });
        }
        Ok(settings)
    }

    fn metadata(
        &mut self,
        target_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>> {
        let bundle = self.id.clone();
        let (archive, names) = self.reader()?;
        let mut metadata = BTreeMap::new();
        for name in names {
            let Some(key) = layout::parse_metadata_entry(name, target_id) else {
                continue;
            };
            check_cancelled(cancel)?;
            metadata.insert(key.to_string(), read_text(archive, &bundle, name)?);
        }
        Ok(metadata)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let ZipBundle { id, path, mode } = *self;
        match mode {
            Mode::Read { .. } => Ok(()),
            Mode::Write {
                mut writer, staged, ..
            } => {
                let version = layout::metadata_entry("", layout::FORMAT_VERSION_KEY);
                write_entry(&mut writer, &id, &version, layout::FORMAT_VERSION)?;
                let file = writer.finish().map_err(|e| archive_error(&id, e))?;
                staged.commit(file)?;
                tracing::debug!(bundle = %id, path = %path.display(), "Bundle finalized");
                Ok(())
            }
        }
    }
}
