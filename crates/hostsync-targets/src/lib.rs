//! Built-in targets and conditions for hostsync
//!
//! [`register_builtins`] makes every element of this crate available to the
//! profile loader under its `type` tag:
//!
//! | tag | element |
//! |-----|---------|
//! | `files` | [`FilesTarget`] |
//! | `stop-if-files-not-exist` | [`StopIfFilesNotExist`] |
//! | `stop-if-directories-not-exist` | [`StopIfDirectoriesNotExist`] |
//! | `null` | [`NullTarget`] |
//! | `check-files-existence` | [`CheckFilesExistence`] |
//! | `check-directories-existence` | [`CheckDirectoriesExistence`] |

pub mod conditions;
pub mod file_set;
pub mod files;
pub mod guards;
pub mod null;

pub use conditions::{CheckDirectoriesExistence, CheckFilesExistence};
pub use file_set::FileSet;
pub use files::FilesTarget;
pub use guards::{StopIfDirectoriesNotExist, StopIfFilesNotExist};
pub use null::NullTarget;

use hostsync_core::ElementRegistry;

/// Register the built-in targets and conditions.
pub fn register_builtins(registry: &mut ElementRegistry) {
    registry.register_target::<FilesTarget>(files::TYPE_NAME);
    registry.register_target::<StopIfFilesNotExist>("stop-if-files-not-exist");
    registry.register_target::<StopIfDirectoriesNotExist>("stop-if-directories-not-exist");
    registry.register_target::<NullTarget>("null");
    registry.register_condition::<CheckFilesExistence>("check-files-existence");
    registry.register_condition::<CheckDirectoriesExistence>("check-directories-existence");
}

/// A registry holding only the built-in elements.
pub fn builtin_registry() -> ElementRegistry {
    let mut registry = ElementRegistry::new();
    register_builtins(&mut registry);
    registry
}
