use std::time::Duration;

use hostsync_core::setting::KEY_NAME;
use hostsync_core::{Error, Setting, SyncContext, Target};
use hostsync_targets::{FilesTarget, builtin_registry};
use hostsync_test_utils::{TestHost, at};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn files_target(host: &TestHost, files: &[&str]) -> FilesTarget {
    FilesTarget::new(
        host.home_str(),
        files.iter().map(|f| f.to_string()).collect(),
    )
}

fn names(settings: &[Setting]) -> Vec<&str> {
    settings
        .iter()
        .filter_map(|s| s.metadata(KEY_NAME))
        .collect()
}

#[tokio::test]
async fn exported_files_import_on_another_host_with_their_times() {
    let source = TestHost::new();
    source.write_home("settings.json", "{\"theme\":\"dark\"}");
    source.write_home("keys/bindings.json", "[]");
    source.set_home_mtime("settings.json", at(2024, 3, 1, 12));
    source.set_home_mtime("keys/bindings.json", at(2024, 3, 2, 12));
    let cancel = CancellationToken::new();

    let exporter = files_target(&source, &["~/settings.json", "~/keys/bindings.json"]);
    let settings = exporter.export(&SyncContext::new(), &cancel).await.unwrap();
    assert_eq!(names(&settings), vec!["./settings.json", "keys/bindings.json"]);
    assert_eq!(
        exporter.last_update(&SyncContext::new(), &cancel).await.unwrap(),
        Some(at(2024, 3, 2, 12))
    );

    let destination = TestHost::new();
    let importer = files_target(&destination, &["~/settings.json", "~/keys/bindings.json"]);
    importer
        .import(&SyncContext::new(), settings, &cancel)
        .await
        .unwrap();

    destination.assert_home_contains("settings.json", "dark");
    assert_eq!(destination.read_home("keys/bindings.json"), "[]");
    assert_eq!(destination.home_mtime("settings.json"), at(2024, 3, 1, 12));
    assert_eq!(
        importer.last_update(&SyncContext::new(), &cancel).await.unwrap(),
        Some(at(2024, 3, 2, 12))
    );
}

#[tokio::test]
async fn nothing_to_export_yields_the_empty_setting() {
    let host = TestHost::new();
    let target = files_target(&host, &["~/absent.json"]).skip_if_not_exists(true);

    let settings = target
        .export(&SyncContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(settings, vec![Setting::empty()]);
    assert_eq!(
        target
            .last_update(&SyncContext::new(), &CancellationToken::new())
            .await
            .unwrap(),
        None
    );
}

#[rstest]
#[case("../outside.json")]
#[case("/etc/outside.json")]
#[case("sub/../../outside.json")]
#[tokio::test]
async fn import_refuses_names_leaving_the_base_path(#[case] name: &str) {
    let host = TestHost::new();
    let target = files_target(&host, &["~/"]);
    let setting = Setting::from_bytes(b"x".to_vec()).with_metadata(KEY_NAME, name);

    let err = target
        .import(&SyncContext::new(), vec![setting], &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fs(hostsync_fs::Error::PathEscapesBase { .. })));
    assert!(!host.root().join("outside.json").exists());
}

#[tokio::test]
async fn excluded_files_are_not_exported() {
    let host = TestHost::new();
    host.write_home("a.json", "a");
    host.write_home("a.json.bak", "backup");
    let target = files_target(&host, &["~/"]).exclude(r"\.bak$");

    let settings = target
        .export(&SyncContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(names(&settings), vec!["./a.json"]);
}

#[test]
fn registry_builds_a_files_target_from_document_fields() {
    let fields: serde_yaml::Value = serde_yaml::from_str(
        "base-path: /home/me\nfiles: [\"~/a.json\"]\nskip-if-not-exists: true\n",
    )
    .unwrap();

    let target = builtin_registry().create_target("Files", fields).unwrap();

    assert_eq!(target.type_name(), "files");
    assert!(target.validate().is_empty());
}

#[test]
fn relative_base_path_fails_validation() {
    let target = FilesTarget::new("relative/dir", vec!["~/a".to_string()]);
    let errors = target.validate();
    assert_eq!(errors.len(), 1);
    assert!(errors.to_string().contains("base-path"));
}

#[tokio::test]
async fn monitor_reports_changed_files() {
    let host = TestHost::new();
    host.write_home("watched.json", "1");
    let target = files_target(&host, &["~/watched.json"]);
    let monitor = target.monitor().unwrap();
    let mut events = monitor.subscribe();
    monitor.start_monitor().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    host.write_home("watched.json", "changed");

    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("no change event")
        .unwrap();
    assert_eq!(event.paths, vec![host.home().join("watched.json")]);

    monitor.stop_monitor();
    assert!(!monitor.is_monitoring());
}
