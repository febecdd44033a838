//! Subscriber setup for the binary

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, Result};

const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "debug";

/// Install the global subscriber.
///
/// The filter comes from `--log-level`, then `-v`, then `RUST_LOG`. With a
/// log file, output goes there instead of stderr through a background
/// writer; keep the returned guard alive until the program exits so that
/// buffered lines are flushed.
pub fn init(
    verbose: bool,
    log_level: Option<&str>,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = filter(verbose, log_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose);

    let (installed, guard) = match log_file {
        Some(path) => {
            let (directory, file_name) = split_log_path(path)?;
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let installed = builder.with_ansi(false).with_writer(writer).try_init();
            (installed, Some(guard))
        }
        None => (builder.with_writer(std::io::stderr).try_init(), None),
    };
    installed.map_err(|e| CliError::user(format!("cannot install logger: {e}")))?;
    tracing::debug!("Logging initialized");
    Ok(guard)
}

fn filter(verbose: bool, log_level: Option<&str>) -> Result<EnvFilter> {
    Ok(match (log_level, verbose) {
        (Some(level), _) => EnvFilter::try_new(level)
            .map_err(|e| CliError::user(format!("invalid log level '{level}': {e}")))?,
        (None, true) => EnvFilter::new(VERBOSE_FILTER),
        (None, false) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
    })
}

/// Directory and file name of a log file path. A bare file name lives in the
/// working directory.
fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CliError::user(format!("invalid log file '{}'", path.display())))?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((directory, file_name))
}
