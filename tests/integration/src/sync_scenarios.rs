//! End-to-end synchronization between hosts sharing a bundle directory
//!
//! Profiles are loaded from YAML with the real loader, bundles are zip files
//! and targets write into each host's temporary home.

use std::sync::Arc;

use hostsync_bundles::ZipBundleFactory;
use hostsync_core::commands::{
    CleanCommand, ExportCommand, ExportOutcome, ImportCommand, ImportOutcome,
};
use hostsync_core::{BundleFactory, Profile};
use hostsync_profiles::{ProfileLoader, TemplateEngine};
use hostsync_test_utils::{TestHost, at};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

const EDITOR: &str = r#"
id: p1
name: Editor
targets:
  - id: user
    type: files
    base-path: ${folder:home}
    files: ["~/settings.json", "~/keys/bindings.json"]
    skip-if-not-exists: true
"#;

const GATED: &str = r#"
id: p2
name: Editor with plugins
targets:
  - id: user
    type: files
    base-path: ${folder:home}
    files: ["~/settings.json"]
    skip-if-not-exists: true
  - id: plugins
    type: files
    base-path: ${folder:home}/plugins
    files: ["~/plugins.json"]
    skip-if-not-exists: true
    conditions:
      - type: check-files-existence
        files: ["${folder:home}/plugins/enabled"]
"#;

struct Host {
    host: TestHost,
    profile: Arc<Profile>,
    factory: ZipBundleFactory,
}

impl Host {
    async fn new(host: TestHost, document: &str) -> Self {
        let loader = ProfileLoader::new(hostsync_targets::builtin_registry())
            .with_tokens(TemplateEngine::new().with_folder("home", host.home()));
        let mut profiles = loader.load_str(document, "profile.yaml", None).await.unwrap();
        assert_eq!(profiles.len(), 1);
        let factory = ZipBundleFactory::new(host.bundles_dir());
        Self {
            profile: Arc::new(profiles.remove(0)),
            host,
            factory,
        }
    }

    async fn export(&self, force: bool) -> ExportOutcome {
        ExportCommand::new(&self.profile, &self.factory)
            .force(force)
            .execute(&CancellationToken::new())
            .await
            .unwrap()
    }

    async fn import(&self, force: bool) -> ImportOutcome {
        ImportCommand::new(&self.profile, &self.factory)
            .force(force)
            .execute(&CancellationToken::new())
            .await
            .unwrap()
    }

    async fn bundle_ids(&self) -> Vec<String> {
        self.factory
            .get_all(self.profile.id(), &CancellationToken::new())
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.id)
            .collect()
    }
}

fn exported(bundle_id: &str, settings: usize) -> ExportOutcome {
    ExportOutcome::Exported {
        bundle_id: bundle_id.to_string(),
        settings,
    }
}

fn imported(bundle_id: &str) -> ImportOutcome {
    ImportOutcome::Imported {
        bundle_id: bundle_id.to_string(),
    }
}

#[tokio::test]
async fn settings_travel_between_hosts_through_bundles() {
    let laptop = Host::new(TestHost::new(), EDITOR).await;
    laptop.host.write_home("settings.json", "{\"theme\":\"light\"}");
    laptop.host.write_home("keys/bindings.json", "[]");
    laptop.host.set_home_mtime("settings.json", at(2024, 5, 1, 9));
    laptop.host.set_home_mtime("keys/bindings.json", at(2024, 5, 1, 8));

    assert_eq!(laptop.export(false).await, exported("p1@20240501-090000", 2));

    // A fresh machine has nothing to compare against and needs force.
    let desktop = Host::new(TestHost::sharing_bundles_with(&laptop.host), EDITOR).await;
    assert_eq!(desktop.import(false).await, ImportOutcome::CannotGetLocalDate);
    assert_eq!(desktop.import(true).await, imported("p1@20240501-090000"));
    assert_eq!(desktop.host.read_home("settings.json"), "{\"theme\":\"light\"}");
    assert_eq!(desktop.host.read_home("keys/bindings.json"), "[]");
    assert_eq!(desktop.host.home_mtime("settings.json"), at(2024, 5, 1, 9));
    assert_eq!(desktop.host.home_mtime("keys/bindings.json"), at(2024, 5, 1, 8));

    laptop.host.write_home("settings.json", "{\"theme\":\"dark\"}");
    laptop.host.set_home_mtime("settings.json", at(2024, 5, 2, 9));
    assert_eq!(laptop.export(false).await, exported("p1@20240502-090000", 2));
    assert_eq!(
        laptop.bundle_ids().await,
        vec!["p1@20240501-090000", "p1@20240502-090000"]
    );

    assert_eq!(desktop.import(false).await, imported("p1@20240502-090000"));
    desktop.host.assert_home_contains("settings.json", "dark");
    assert_eq!(desktop.host.home_mtime("settings.json"), at(2024, 5, 2, 9));

    // Going back to an older local state never produces a bundle.
    laptop.host.set_home_mtime("settings.json", at(2024, 5, 1, 9));
    assert!(matches!(
        laptop.export(false).await,
        ExportOutcome::SettingsOlderThanBundle { .. }
    ));
    assert_eq!(laptop.bundle_ids().await.len(), 2);
}

#[tokio::test]
async fn repeated_runs_change_nothing() {
    let laptop = Host::new(TestHost::new(), EDITOR).await;
    laptop.host.write_home("settings.json", "{}");
    laptop.host.set_home_mtime("settings.json", at(2024, 6, 1, 0));

    assert_eq!(laptop.export(false).await, exported("p1@20240601-000000", 1));
    assert_eq!(
        laptop.export(false).await,
        ExportOutcome::SettingsOlderThanBundle {
            bundle_id: "p1@20240601-000000".to_string()
        }
    );
    assert_eq!(
        laptop.import(false).await,
        ImportOutcome::LocalAlreadyNewer {
            bundle_id: "p1@20240601-000000".to_string()
        }
    );
    assert_eq!(laptop.bundle_ids().await, vec!["p1@20240601-000000"]);
    assert_eq!(laptop.host.home_mtime("settings.json"), at(2024, 6, 1, 0));
}

#[tokio::test]
async fn newest_side_wins_a_conflict() {
    let laptop = Host::new(TestHost::new(), EDITOR).await;
    laptop.host.write_home("settings.json", "from laptop");
    laptop.host.set_home_mtime("settings.json", at(2024, 7, 1, 10));
    laptop.export(false).await;

    let desktop = Host::new(TestHost::sharing_bundles_with(&laptop.host), EDITOR).await;
    desktop.host.write_home("settings.json", "from desktop");
    desktop.host.set_home_mtime("settings.json", at(2024, 7, 1, 12));

    // The desktop edit is newer: importing keeps it, exporting publishes it.
    assert!(matches!(
        desktop.import(false).await,
        ImportOutcome::LocalAlreadyNewer { .. }
    ));
    assert_eq!(desktop.host.read_home("settings.json"), "from desktop");
    assert_eq!(desktop.export(false).await, exported("p1@20240701-120000", 1));

    assert_eq!(laptop.import(false).await, imported("p1@20240701-120000"));
    assert_eq!(laptop.host.read_home("settings.json"), "from desktop");
}

#[tokio::test]
async fn forced_import_overwrites_newer_local_settings() {
    let laptop = Host::new(TestHost::new(), EDITOR).await;
    laptop.host.write_home("settings.json", "old");
    laptop.host.set_home_mtime("settings.json", at(2024, 1, 1, 0));
    laptop.export(false).await;

    laptop.host.write_home("settings.json", "new");
    laptop.host.set_home_mtime("settings.json", at(2024, 2, 1, 0));

    assert_eq!(laptop.import(true).await, imported("p1@20240101-000000"));
    assert_eq!(laptop.host.read_home("settings.json"), "old");
    assert_eq!(laptop.host.home_mtime("settings.json"), at(2024, 1, 1, 0));
}

#[tokio::test]
async fn conditions_gate_targets_on_both_sides() {
    let laptop = Host::new(TestHost::new(), GATED).await;
    laptop.host.write_home("settings.json", "{}");
    laptop.host.write_home("plugins/plugins.json", "[\"vim\"]");
    laptop.host.set_home_mtime("settings.json", at(2024, 8, 1, 0));
    laptop.host.set_home_mtime("plugins/plugins.json", at(2024, 8, 1, 0));

    // Without the marker file only the user target takes part.
    assert_eq!(laptop.export(false).await, exported("p2@20240801-000000", 1));

    let desktop = Host::new(TestHost::sharing_bundles_with(&laptop.host), GATED).await;
    desktop.host.write_home("plugins/plugins.json", "[\"local\"]");
    desktop.import(true).await;
    desktop.host.assert_home_contains("settings.json", "{}");
    assert_eq!(desktop.host.read_home("plugins/plugins.json"), "[\"local\"]");

    laptop.host.write_home("plugins/enabled", "");
    laptop.host.set_home_mtime("settings.json", at(2024, 8, 2, 0));
    assert_eq!(laptop.export(false).await, exported("p2@20240802-000000", 2));

    desktop.host.write_home("plugins/enabled", "");
    assert_eq!(desktop.import(true).await, imported("p2@20240802-000000"));
    assert_eq!(desktop.host.read_home("plugins/plugins.json"), "[\"vim\"]");
}

#[rstest]
#[case::keeps_recent(10_000.0, 2)]
#[case::drops_everything_old(1.0, 0)]
#[tokio::test]
async fn clean_removes_bundles_past_the_age_limit(#[case] max_days: f64, #[case] remaining: usize) {
    let laptop = Host::new(TestHost::new(), EDITOR).await;
    laptop.host.write_home("settings.json", "{}");
    laptop.host.set_home_mtime("settings.json", at(2023, 1, 1, 0));
    laptop.export(false).await;
    laptop.host.set_home_mtime("settings.json", at(2023, 2, 1, 0));
    laptop.export(false).await;
    assert_eq!(laptop.bundle_ids().await.len(), 2);

    let report = CleanCommand::new(std::slice::from_ref(&laptop.profile), &laptop.factory)
        .max_days(max_days)
        .execute(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.removed.len(), 2 - remaining);
    assert_eq!(laptop.bundle_ids().await.len(), remaining);
}

#[tokio::test]
async fn clean_covers_every_profile_sharing_the_directory() {
    let editor = Host::new(TestHost::new(), EDITOR).await;
    editor.host.write_home("settings.json", "{}");
    editor.host.set_home_mtime("settings.json", at(2023, 3, 1, 0));
    editor.export(false).await;

    let gated = Host::new(TestHost::sharing_bundles_with(&editor.host), GATED).await;
    gated.host.write_home("settings.json", "{}");
    gated.host.set_home_mtime("settings.json", at(2023, 4, 1, 0));
    gated.export(false).await;

    let profiles = vec![Arc::clone(&editor.profile), Arc::clone(&gated.profile)];
    let report = CleanCommand::new(&profiles, &editor.factory)
        .max_days(1.0)
        .execute(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.removed, vec!["p1@20230301-000000", "p2@20230401-000000"]);
    assert!(editor.bundle_ids().await.is_empty());
    assert!(gated.bundle_ids().await.is_empty());
}
