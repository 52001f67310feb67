//! HTTP adapters for a PostgREST / GoTrue style backend.

mod config_store;
mod identity;

pub use config_store::RestConfigStore;
pub use identity::RestIdentityService;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings shared by the HTTP adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Base URL of the backend (e.g. `https://project.example.co`).
    pub base_url: String,
    /// Public API key sent as `apikey` and as the default bearer token.
    pub api_key: String,
    /// Table holding the `(key, value, updated_at)` rows, plus the
    /// database-maintained `changed_at` column the change feed follows.
    pub table: String,
    /// Table holding user profiles.
    pub profiles_table: String,
    /// How often the change feed polls for new rows (ms).
    pub poll_interval_ms: u64,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            table: "settings".to_string(),
            profiles_table: "profiles".to_string(),
            poll_interval_ms: 2_000,
            timeout_ms: 5_000,
        }
    }
}

impl RestConfig {
    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder().timeout(self.timeout()).build()
    }
}
