//! Filesystem primitives for hostsync
//!
//! Provides forward-slash path handling, atomic writes, content checksums,
//! wildcard matching and a polling directory watcher.

pub mod checksum;
pub mod error;
pub mod io;
pub mod path;
pub mod watch;
pub mod wildcard;

pub use error::{Error, Result};
pub use path::{SlashPath, join_within, validate_path_identifier};
pub use watch::{FileStamp, FsEvent, FsEventKind, PollWatcher, Snapshot};
pub use wildcard::{has_wildcards, wildcard_to_regex};
