use std::fs;
use std::time::{Duration, SystemTime};

use hostsync_fs::io::{self, StagedFile};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_parent_and_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("test.txt");

    io::write_atomic(&path, b"hello world").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.txt");
    fs::write(&path, "original").unwrap();

    io::write_atomic(&path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_from_reports_size_and_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.bin");
    let mut reader: &[u8] = &[7u8; 1024];

    let written = io::write_atomic_from(&path, &mut reader).unwrap();

    assert_eq!(written, 1024);
    let names: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["data.bin".to_string()]);
}

#[test]
fn test_dropped_staged_file_removes_temp() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bundle.zip");

    let (staged, file) = StagedFile::create(&path).unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    assert!(temp_path.exists());
    drop(file);
    drop(staged);

    assert!(!temp_path.exists());
    assert!(!path.exists());
}

#[test]
fn test_set_modified_round_trips() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("f.txt");
    fs::write(&path, "x").unwrap();
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);

    io::set_modified(&path, when).unwrap();

    assert_eq!(io::modified(&path).unwrap(), when);
}
