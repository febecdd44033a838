//! Command objects driving targets against a bundle factory
//!
//! Every command exposes one async `execute` entry point taking a
//! cancellation token. Skips are not failures: they come back as outcome
//! variants describing why nothing was transferred.

mod clean;
mod export;
mod import;
mod monitor;

pub use clean::{CleanCommand, CleanReport, DEFAULT_MAX_DAYS};
pub use export::{ExportCommand, ExportOutcome};
pub use import::{ImportCommand, ImportOutcome};
pub use monitor::{MonitorOptions, MonitorSession, StartMonitorCommand, StopMonitorCommand};
