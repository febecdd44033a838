//! Export, import and sync commands

use colored::Colorize;
use hostsync_core::commands::{ExportCommand, ExportOutcome, ImportCommand, ImportOutcome};
use hostsync_core::{Error, Profile};
use tokio_util::sync::CancellationToken;

use super::{check_failures, report_failure};
use crate::context::AppContext;
use crate::error::Result;

fn print_export(profile: &Profile, outcome: &ExportOutcome) {
    let id = profile.id().cyan();
    match outcome {
        ExportOutcome::Exported {
            bundle_id,
            settings,
        } => println!("  {} {id}: exported {settings} setting(s) to {bundle_id}", "+".green()),
        ExportOutcome::NothingExported => println!("  {} {id}: nothing to export", "-".dimmed()),
        ExportOutcome::CannotDetermineLocalDate => {
            println!("  {} {id}: cannot determine local date, use --force", "-".yellow())
        }
        ExportOutcome::SettingsOlderThanBundle { bundle_id } => {
            println!("  {} {id}: up to date with {bundle_id}", "=".dimmed())
        }
    }
}

fn print_import(profile: &Profile, outcome: &ImportOutcome) {
    let id = profile.id().cyan();
    match outcome {
        ImportOutcome::Imported { bundle_id } => {
            println!("  {} {id}: imported {bundle_id}", "+".green())
        }
        ImportOutcome::NoBundles => println!("  {} {id}: no bundles", "-".dimmed()),
        ImportOutcome::CannotGetLocalDate => {
            println!("  {} {id}: cannot determine local date, use --force", "-".yellow())
        }
        ImportOutcome::LocalAlreadyNewer { bundle_id } => {
            println!("  {} {id}: local settings newer than {bundle_id}", "=".dimmed())
        }
    }
}

async fn export_one(
    ctx: &AppContext,
    profile: &Profile,
    force: bool,
    cancel: &CancellationToken,
) -> std::result::Result<(), Error> {
    let outcome = ExportCommand::new(profile, ctx.factory.as_ref())
        .force(force)
        .execute(cancel)
        .await?;
    print_export(profile, &outcome);
    Ok(())
}

async fn import_one(
    ctx: &AppContext,
    profile: &Profile,
    force: bool,
    cancel: &CancellationToken,
) -> std::result::Result<(), Error> {
    let outcome = ImportCommand::new(profile, ctx.factory.as_ref())
        .force(force)
        .execute(cancel)
        .await?;
    print_import(profile, &outcome);
    Ok(())
}

/// Run the export command
pub async fn run_export(
    ctx: &AppContext,
    profile: Option<&str>,
    force: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    println!("{}", "Export".bold());
    let mut failures = 0;
    for profile in ctx.select(profile)? {
        match export_one(ctx, &profile, force, cancel).await {
            Err(Error::Cancelled) => return Err(Error::Cancelled.into()),
            Err(e) => report_failure(&profile, &e, &mut failures),
            Ok(()) => {}
        }
    }
    check_failures(failures)
}

/// Run the import command
pub async fn run_import(
    ctx: &AppContext,
    profile: Option<&str>,
    force: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    println!("{}", "Import".bold());
    let mut failures = 0;
    for profile in ctx.select(profile)? {
        match import_one(ctx, &profile, force, cancel).await {
            Err(Error::Cancelled) => return Err(Error::Cancelled.into()),
            Err(e) => report_failure(&profile, &e, &mut failures),
            Ok(()) => {}
        }
    }
    check_failures(failures)
}

/// Run the sync command: import first so local edits never hide a newer
/// bundle, then export what is left newer locally.
pub async fn run_sync(ctx: &AppContext, profile: Option<&str>, cancel: &CancellationToken) -> Result<()> {
    println!("{}", "Sync".bold());
    let mut failures = 0;
    for profile in ctx.select(profile)? {
        let result = match import_one(ctx, &profile, false, cancel).await {
            Ok(()) => export_one(ctx, &profile, false, cancel).await,
            Err(e) => Err(e),
        };
        match result {
            Err(Error::Cancelled) => return Err(Error::Cancelled.into()),
            Err(e) => report_failure(&profile, &e, &mut failures),
            Ok(()) => {}
        }
    }
    check_failures(failures)
}
