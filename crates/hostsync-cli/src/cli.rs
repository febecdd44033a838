//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// hostsync - Synchronize application settings between hosts through a shared directory
#[derive(Parser, Debug)]
#[command(name = "hostsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user's config directory)
    #[arg(short, long, global = true, env = "HOSTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Profile file or directory; overrides `profiles-source`
    #[arg(short, long = "profiles", global = true)]
    pub profiles: Vec<PathBuf>,

    /// Bundle directory; overrides `bundles-directory`
    #[arg(short, long, global = true)]
    pub bundles: Option<PathBuf>,

    /// Wildcard pattern of profile ids to skip; adds to `profiles-exclude`
    #[arg(short, long, global = true)]
    pub exclude: Vec<String>,

    /// Base URL for `global://` profile includes
    #[arg(long, global = true, env = "HOSTSYNC_GLOBAL_URL")]
    pub global_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log filter, e.g. `info` or `hostsync_core=debug`
    #[arg(long, global = true, env = "HOSTSYNC_LOG")]
    pub log_level: Option<String>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Export local settings into new bundles
    Export {
        /// Export even when the latest bundle is as new as local settings
        #[arg(short, long)]
        force: bool,

        /// Only this profile
        #[arg(long)]
        profile: Option<String>,
    },

    /// Import the latest bundle of each profile
    Import {
        /// Import even when local settings are newer or undated
        #[arg(short, long)]
        force: bool,

        /// Only this profile
        #[arg(long)]
        profile: Option<String>,
    },

    /// Import, then export, every profile
    Sync {
        /// Only this profile
        #[arg(long)]
        profile: Option<String>,
    },

    /// Remove outdated bundles
    Clean {
        /// Remove bundles older than this many days
        #[arg(long, default_value_t = hostsync_core::commands::DEFAULT_MAX_DAYS)]
        max_days: f64,
    },

    /// Watch local settings and the bundle directory until Ctrl-C
    Monitor {
        /// Seconds of quiet after a local change before exporting
        #[arg(long, default_value_t = 3)]
        delay: u64,

        /// Seconds before a failed export is retried; 0 disables retries
        #[arg(long, default_value_t = 30)]
        retry: u64,
    },

    /// Show profiles, their local state and latest bundles
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
