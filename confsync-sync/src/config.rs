use std::time::Duration;

use confsync_types::keys;
use serde::{Deserialize, Serialize};

/// Configuration for the sync coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Keys bulk-loaded from the remote store on start.
    pub known_keys: Vec<String>,
    /// Timeout applied to every remote call before it counts as unavailable (ms).
    pub io_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            known_keys: keys::ALL.iter().map(|k| k.to_string()).collect(),
            io_timeout_ms: 5_000,
        }
    }
}

impl SyncConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}
