//! Monitor command implementation

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use hostsync_core::BundleFactory;
use hostsync_core::commands::{MonitorOptions, StartMonitorCommand, StopMonitorCommand};
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::error::Result;

/// Run the monitor command until Ctrl-C or `cancel`.
pub async fn run_monitor(
    ctx: &AppContext,
    delay: Duration,
    retry: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let options = MonitorOptions {
        execution_delay: delay,
        fail_retry: retry,
        disable_import: ctx.config.disable_import(),
        disable_export: ctx.config.disable_export(),
        ..MonitorOptions::default()
    };
    let factory: Arc<dyn BundleFactory> = ctx.factory.clone();

    let mut session = StartMonitorCommand::new(ctx.profiles.clone(), Arc::clone(&factory))
        .options(options)
        .execute(cancel)
        .await?;
    println!(
        "{} {} profile(s), bundles in {}. Press Ctrl-C to stop.",
        "Monitoring".green().bold(),
        ctx.profiles.len(),
        ctx.factory.directory().display()
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    StopMonitorCommand::new(ctx.profiles.clone(), factory).execute(Some(&mut session));
    println!("{}", "Stopped".bold());
    Ok(())
}
