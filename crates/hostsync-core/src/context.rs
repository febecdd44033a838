//! Per-operation side channel shared by the targets of one export or import

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Key/value exchange map plus a flag any target can raise to stop the
/// remaining targets of the current pass.
#[derive(Debug, Default)]
pub struct SyncContext {
    items: Mutex<HashMap<String, String>>,
    cancel_processing: AtomicBool,
}

impl SyncContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    /// Ask the running command to skip every remaining target.
    pub fn cancel_processing(&self) {
        self.cancel_processing.store(true, Ordering::SeqCst);
    }

    pub fn is_processing_cancelled(&self) -> bool {
        self.cancel_processing.load(Ordering::SeqCst)
    }
}
