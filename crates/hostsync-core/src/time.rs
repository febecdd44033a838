//! Tick-based timestamps
//!
//! Bundles store instants as tick counts: 100-nanosecond intervals since
//! 0001-01-01T00:00:00Z. Local file times are truncated to the same
//! resolution so a value read back from a bundle compares equal to the
//! one that was written.

use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

pub const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Sortable UTC format used in bundle ids.
pub const BUNDLE_TIME_FORMAT: &str = "%Y%m%d-%H%M%S";

pub fn to_ticks(time: DateTime<Utc>) -> i64 {
    UNIX_EPOCH_TICKS
        + time.timestamp() * TICKS_PER_SECOND
        + i64::from(time.timestamp_subsec_nanos()) / NANOS_PER_TICK
}

pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Parse a tick count stored as metadata text.
pub fn parse_ticks(value: &str) -> Result<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(from_ticks)
        .ok_or_else(|| Error::parse(format!("invalid tick value '{}'", value)))
}

/// Drop precision below one tick.
pub fn truncate_to_ticks(time: DateTime<Utc>) -> DateTime<Utc> {
    from_ticks(to_ticks(time)).unwrap_or(time)
}

/// Convert a file system time into a tick-precise UTC instant.
pub fn from_system_time(time: SystemTime) -> DateTime<Utc> {
    truncate_to_ticks(DateTime::<Utc>::from(time))
}

pub fn format_bundle_time(time: DateTime<Utc>) -> String {
    time.format(BUNDLE_TIME_FORMAT).to_string()
}

pub fn parse_bundle_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, BUNDLE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
