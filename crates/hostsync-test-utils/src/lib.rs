//! Shared test fixtures for the hostsync workspace.
//!
//! Dev-dependency only. [`TestHost`] models one machine: a home directory
//! holding the synchronized files, a profiles directory and a bundle
//! directory that several hosts can share.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

/// A temporary machine layout with helpers for setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use hostsync_test_utils::TestHost;
///
/// let host = TestHost::new();
/// host.write_home("settings.json", "{}");
/// host.write_profile("editor", "targets: []\n");
/// host.assert_home_contains("settings.json", "{}");
/// ```
pub struct TestHost {
    temp_dir: TempDir,
    bundles: PathBuf,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    /// A host with its own bundle directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let bundles = temp_dir.path().join("bundles");
        let host = Self { temp_dir, bundles };
        host.create_layout();
        host
    }

    /// A second host sharing `other`'s bundle directory.
    pub fn sharing_bundles_with(other: &TestHost) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let host = Self {
            temp_dir,
            bundles: other.bundles_dir().to_path_buf(),
        };
        host.create_layout();
        host
    }

    fn create_layout(&self) {
        fs::create_dir_all(self.home()).unwrap();
        fs::create_dir_all(self.profiles_dir()).unwrap();
        fs::create_dir_all(&self.bundles).unwrap();
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory holding the synchronized files.
    pub fn home(&self) -> PathBuf {
        self.root().join("home")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root().join("profiles")
    }

    pub fn bundles_dir(&self) -> &Path {
        &self.bundles
    }

    /// `home()` as a string, for use inside profile documents.
    pub fn home_str(&self) -> String {
        self.home().to_string_lossy().replace('\\', "/")
    }

    /// Write `content` to `relative` below the home directory.
    pub fn write_home(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.home().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read_home(&self, relative: &str) -> String {
        let path = self.home().join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", path.display()))
    }

    /// Write a profile document named `<name>.yaml`.
    pub fn write_profile(&self, name: &str, yaml: &str) -> PathBuf {
        let path = self.profiles_dir().join(format!("{name}.yaml"));
        fs::write(&path, yaml).unwrap();
        path
    }

    /// Names of the archives in the bundle directory, sorted.
    pub fn bundle_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.bundles)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|n| n.ends_with(".zip"))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Set the modification time of a home file.
    pub fn set_home_mtime(&self, relative: &str, time: DateTime<Utc>) {
        set_mtime(&self.home().join(relative), time);
    }

    pub fn home_mtime(&self, relative: &str) -> DateTime<Utc> {
        mtime(&self.home().join(relative))
    }

    /// # Panics
    /// Panics if the file does not exist or does not contain `content`.
    pub fn assert_home_contains(&self, relative: &str, content: &str) {
        let file_content = self.read_home(relative);
        assert!(
            file_content.contains(content),
            "Expected {relative} to contain {content:?}, found {file_content:?}"
        );
    }

    pub fn assert_home_missing(&self, relative: &str) {
        let path = self.home().join(relative);
        assert!(!path.exists(), "Expected file NOT to exist: {}", path.display());
    }
}

/// Set the modification time of an existing file.
pub fn set_mtime(path: &Path, time: DateTime<Utc>) {
    hostsync_fs::io::set_modified(path, SystemTime::from(time)).unwrap();
}

/// Modification time of a file, truncated to whole seconds.
pub fn mtime(path: &Path) -> DateTime<Utc> {
    let modified: DateTime<Utc> = hostsync_fs::io::modified(path).unwrap().into();
    Utc.timestamp_opt(modified.timestamp(), 0).unwrap()
}

/// A fixed UTC time, for readable assertions.
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}
