//! Clean command implementation

use colored::Colorize;
use hostsync_core::commands::CleanCommand;
use hostsync_core::parse_bundle_id;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the clean command
pub async fn run_clean(ctx: &AppContext, max_days: f64, cancel: &CancellationToken) -> Result<()> {
    if !max_days.is_finite() || max_days < 0.0 {
        return Err(CliError::user("--max-days must be a non-negative number"));
    }
    println!("{}", "Clean".bold());
    let report = CleanCommand::new(&ctx.profiles, ctx.factory.as_ref())
        .max_days(max_days)
        .execute(cancel)
        .await?;

    if report.removed.is_empty() {
        println!("  {} nothing to remove", "-".dimmed());
    }
    for id in &report.removed {
        let profile = parse_bundle_id(id).map_or("?", |(profile, _)| profile);
        println!("  {} {}: removed {id}", "x".yellow(), profile.cyan());
    }
    Ok(())
}
