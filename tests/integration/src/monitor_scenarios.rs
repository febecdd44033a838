//! Monitor mode against real files and a zip bundle directory

use std::sync::Arc;
use std::time::Duration;

use hostsync_bundles::ZipBundleFactory;
use hostsync_core::commands::{MonitorOptions, StartMonitorCommand, StopMonitorCommand};
use hostsync_core::{BundleFactory, Profile};
use hostsync_profiles::{ProfileLoader, TemplateEngine};
use hostsync_test_utils::{TestHost, at};
use tokio_util::sync::CancellationToken;

const PROFILE: &str = r#"
id: watched
name: Watched
targets:
  - type: files
    base-path: ${folder:home}
    files: ["~/settings.json"]
    skip-if-not-exists: true
"#;

async fn load(host: &TestHost) -> Arc<Profile> {
    let loader = ProfileLoader::new(hostsync_targets::builtin_registry())
        .with_tokens(TemplateEngine::new().with_folder("home", host.home()));
    let mut profiles = loader.load_str(PROFILE, "watched.yaml", None).await.unwrap();
    Arc::new(profiles.remove(0))
}

fn fast_options() -> MonitorOptions {
    MonitorOptions {
        execution_delay: Duration::from_millis(200),
        fail_retry: Duration::from_millis(500),
        tick: Duration::from_millis(50),
        ..MonitorOptions::default()
    }
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(20), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn bundle_count(factory: &dyn BundleFactory, profile: &str) -> usize {
    factory
        .get_all(profile, &CancellationToken::new())
        .await
        .map(|all| all.len())
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread")]
async fn local_edits_are_exported_after_the_quiet_period() {
    let host = TestHost::new();
    host.write_home("settings.json", "{}");
    host.set_home_mtime("settings.json", at(2024, 9, 1, 0));
    let profile = load(&host).await;
    let factory: Arc<dyn BundleFactory> = Arc::new(ZipBundleFactory::with_poll_interval(
        host.bundles_dir(),
        Duration::from_millis(100),
    ));
    let cancel = CancellationToken::new();

    let mut session = StartMonitorCommand::new(vec![Arc::clone(&profile)], Arc::clone(&factory))
        .options(MonitorOptions {
            disable_import: true,
            ..fast_options()
        })
        .execute(&cancel)
        .await
        .unwrap();

    // Starting synchronizes once.
    assert_eq!(bundle_count(factory.as_ref(), "watched").await, 1);
    assert!(profile.is_monitoring());

    host.write_home("settings.json", "{\"edited\":true}");
    let storage = factory.as_ref();
    wait_for(move || async move { bundle_count(storage, "watched").await == 2 }).await;

    StopMonitorCommand::new(vec![Arc::clone(&profile)], Arc::clone(&factory))
        .execute(Some(&mut session));
    assert!(!profile.is_monitoring());
}

#[tokio::test(flavor = "multi_thread")]
async fn bundles_from_another_host_are_imported() {
    let laptop = TestHost::new();
    let desktop = TestHost::sharing_bundles_with(&laptop);
    desktop.write_home("settings.json", "desktop");
    desktop.set_home_mtime("settings.json", at(2024, 9, 1, 0));

    let desktop_profile = load(&desktop).await;
    let desktop_factory: Arc<dyn BundleFactory> = Arc::new(ZipBundleFactory::with_poll_interval(
        desktop.bundles_dir(),
        Duration::from_millis(100),
    ));
    let cancel = CancellationToken::new();
    let mut session = StartMonitorCommand::new(vec![Arc::clone(&desktop_profile)], Arc::clone(&desktop_factory))
        .options(MonitorOptions {
            disable_export: true,
            ..fast_options()
        })
        .execute(&cancel)
        .await
        .unwrap();

    laptop.write_home("settings.json", "laptop");
    laptop.set_home_mtime("settings.json", at(2024, 9, 2, 0));
    let laptop_profile = load(&laptop).await;
    let laptop_factory = ZipBundleFactory::new(laptop.bundles_dir());
    hostsync_core::commands::ExportCommand::new(&laptop_profile, &laptop_factory)
        .execute(&cancel)
        .await
        .unwrap();

    let watched = &desktop;
    wait_for(move || async move { watched.read_home("settings.json") == "laptop" }).await;
    assert_eq!(desktop.home_mtime("settings.json"), at(2024, 9, 2, 0));

    cancel.cancel();
    StopMonitorCommand::new(vec![desktop_profile], desktop_factory).execute(Some(&mut session));
}
