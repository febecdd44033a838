//! Status command implementation

use colored::Colorize;
use hostsync_core::time::format_bundle_time;
use hostsync_core::BundleFactory;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::error::Result;

/// Run the status command
pub async fn run_status(ctx: &AppContext, json: bool, cancel: &CancellationToken) -> Result<()> {
    let mut entries = Vec::with_capacity(ctx.profiles.len());
    for profile in &ctx.profiles {
        let bundles = ctx.factory.get_all(profile.id(), cancel).await?;
        let local = match profile.latest_local_update(cancel).await {
            Ok(local) => local,
            Err(hostsync_core::Error::Cancelled) => return Err(hostsync_core::Error::Cancelled.into()),
            Err(e) => {
                tracing::warn!(profile = %profile.id(), error = %e, "Cannot determine local update");
                None
            }
        };
        entries.push((profile, local, bundles));
    }

    if json {
        let output: Vec<_> = entries
            .iter()
            .map(|(profile, local, bundles)| {
                json!({
                    "id": profile.id(),
                    "name": profile.name(),
                    "description": profile.description(),
                    "targets": profile.targets().len(),
                    "local_update": local,
                    "bundles": bundles,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Status".bold());
    println!();
    println!("{}:   {}", "Bundles".dimmed(), ctx.factory.directory().display());
    println!();
    if entries.is_empty() {
        println!("  {}", "No profiles".dimmed());
    }
    for (profile, local, bundles) in &entries {
        println!("{} ({})", profile.id().cyan().bold(), profile.name());
        if let Some(description) = profile.description() {
            println!("  {}", description.dimmed());
        }
        let local = local
            .map(format_bundle_time)
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {}:  {}", "Local".dimmed(), local);
        match bundles.last() {
            Some(latest) => println!(
                "  {}: {} ({} bundle(s), {} bytes)",
                "Latest".dimmed(),
                latest.id,
                bundles.len(),
                latest.size
            ),
            None => println!("  {}: {}", "Latest".dimmed(), "none".yellow()),
        }
    }
    Ok(())
}
