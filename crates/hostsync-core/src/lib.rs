//! Core synchronization engine for hostsync
//!
//! This crate defines the model and the commands that move settings
//! between a host and a shared bundle store:
//!
//! - [`Target`] and [`Condition`]: the extension points for what gets
//!   synchronized and when, created by type name through an
//!   [`ElementRegistry`]
//! - [`Profile`]: a named, validated collection of targets
//! - [`Bundle`] and [`BundleFactory`]: timestamped snapshots and their store
//! - [`commands`]: export, import, clean and the monitor coordinator
//! - [`DelayActionRunner`]: debounced, retried background actions

pub mod bundle;
pub mod commands;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod monitor;
pub mod profile;
pub mod registry;
pub mod runner;
pub mod setting;
pub mod target;
pub mod time;
pub mod tokens;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use bundle::{Bundle, BundleFactory, BundleInfo, format_bundle_id, parse_bundle_id};
pub use condition::Condition;
pub use config::UserConfiguration;
pub use context::SyncContext;
pub use error::{ElementKind, Error, Result, check_cancelled};
pub use monitor::{BundleEvent, DEFAULT_POLL_INTERVAL, Monitor, PollMonitor, TargetEvent};
pub use profile::{Profile, ProfileTarget, TargetCondition};
pub use registry::ElementRegistry;
pub use runner::{DelayActionRunner, RunnerEvent};
pub use setting::{Setting, SettingContent};
pub use target::Target;
pub use tokens::{NoTokens, TokenResolver};
pub use validation::{ValidationError, ValidationErrors};
