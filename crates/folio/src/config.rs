//! Store configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Behaviour knobs shared by every collection store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Per-request limit for gateway calls, in seconds. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    /// Re-list the collection after a successful create, edit or remove.
    pub refresh_after_mutation: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: Some(30),
            refresh_after_mutation: true,
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// No timeout and no refresh: every remote call is one the caller asked for.
    pub fn minimal() -> Self {
        Self {
            request_timeout_secs: None,
            refresh_after_mutation: false,
        }
    }
}
