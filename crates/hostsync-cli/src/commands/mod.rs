//! Command implementations for the hostsync CLI

mod clean;
mod monitor;
mod status;
mod transfer;

pub use clean::run_clean;
pub use monitor::run_monitor;
pub use status::run_status;
pub use transfer::{run_export, run_import, run_sync};

use colored::Colorize;
use hostsync_core::Profile;

use crate::error::{CliError, Result};

/// Report a failed profile and count it.
fn report_failure(profile: &Profile, error: &dyn std::fmt::Display, failures: &mut usize) {
    eprintln!("  {} {}: {}", "x".red(), profile.id().cyan(), error);
    *failures += 1;
}

/// Error when any profile failed, so the process exits non-zero.
fn check_failures(failures: usize) -> Result<()> {
    if failures == 0 {
        Ok(())
    } else {
        Err(CliError::user(format!("{failures} profile(s) failed")))
    }
}
