//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;

use crate::{Error, Result};

/// A file being written next to its final location.
///
/// Content goes to a hidden, process-specific temp file in the same
/// directory which is renamed over the destination on [`commit`]. A staged
/// file that is dropped without being committed removes its temp file, so
/// readers never observe partial content.
///
/// [`commit`]: StagedFile::commit
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Create the temp file for `final_path` and take an exclusive lock on it.
    pub fn create(final_path: &Path) -> Result<(Self, File)> {
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let temp_path = staging_path(final_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;

        file.lock_exclusive().map_err(|_| Error::LockFailed {
            path: final_path.to_path_buf(),
        })?;

        Ok((
            Self {
                temp_path,
                final_path: final_path.to_path_buf(),
                committed: false,
            },
            file,
        ))
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush `file` to disk and move it into place.
    pub fn commit(mut self, file: File) -> Result<()> {
        file.sync_all().map_err(|e| Error::io(&self.temp_path, e))?;
        file.unlock().map_err(|_| Error::LockFailed {
            path: self.final_path.clone(),
        })?;
        drop(file);

        fs::rename(&self.temp_path, &self.final_path)
            .map_err(|e| Error::io(&self.final_path, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.temp_path.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
    }
}

fn staging_path(final_path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        final_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    final_path.with_file_name(temp_name)
}

/// Write content atomically to a file with locking.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut reader = content;
    write_atomic_from(path, &mut reader).map(|_| ())
}

/// Stream `reader` into `path` atomically, returning the number of bytes written.
pub fn write_atomic_from(path: &Path, reader: &mut dyn Read) -> Result<u64> {
    let (staged, mut file) = StagedFile::create(path)?;
    let written = io::copy(reader, &mut file).map_err(|e| Error::io(staged.temp_path(), e))?;
    staged.commit(file)?;
    Ok(written)
}

/// Set the last-modification time of an existing file.
pub fn set_modified(path: &Path, time: SystemTime) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.set_modified(time).map_err(|e| Error::io(path, e))
}

/// Read the last-modification time of a file.
pub fn modified(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(path, e))
}
