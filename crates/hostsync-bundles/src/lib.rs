//! Zip-backed bundle storage for hostsync
//!
//! [`ZipBundleFactory`] keeps one archive per bundle in a shared directory
//! and watches that directory for bundles written by other hosts.

mod factory;
pub mod layout;
mod zip_bundle;

pub use factory::{BUNDLE_EXTENSION, ZipBundleFactory};
pub use zip_bundle::ZipBundle;
