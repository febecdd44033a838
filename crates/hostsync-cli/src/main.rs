//! hostsync CLI
//!
//! Loads the user configuration and profiles, then runs one command
//! against the bundle directory.

mod cli;
mod commands;
mod context;
mod error;
mod logging;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use context::AppContext;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = context::configuration(&cli)?;
    // Flushes the log file when dropped at the end of the run.
    let _log_guard = logging::init(
        cli.verbose,
        cli.log_level.as_deref(),
        config.log_file().as_deref(),
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let ctx = AppContext::load(&cli, config).await?;
        execute_command(&ctx, cli.command.clone()).await
    })
}

async fn execute_command(ctx: &AppContext, cmd: Commands) -> Result<()> {
    let cancel = CancellationToken::new();
    match cmd {
        Commands::Export { force, profile } => {
            commands::run_export(ctx, profile.as_deref(), force, &cancel).await
        }
        Commands::Import { force, profile } => {
            commands::run_import(ctx, profile.as_deref(), force, &cancel).await
        }
        Commands::Sync { profile } => commands::run_sync(ctx, profile.as_deref(), &cancel).await,
        Commands::Clean { max_days } => commands::run_clean(ctx, max_days, &cancel).await,
        Commands::Monitor { delay, retry } => {
            commands::run_monitor(
                ctx,
                Duration::from_secs(delay),
                Duration::from_secs(retry),
                &cancel,
            )
            .await
        }
        Commands::Status { json } => commands::run_status(ctx, json, &cancel).await,
    }
}
