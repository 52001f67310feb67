use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use confsync_remote::RestConfig;
use confsync_session::SessionConfig;
use confsync_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Everything the binary needs, as read from the JSON config file.
///
/// Missing fields take their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub remote: RestConfig,
    pub sync: SyncConfig,
    pub session: SessionConfig,
    /// SQLite file backing the local mirror.
    pub mirror_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            remote: RestConfig::default(),
            sync: SyncConfig::default(),
            session: SessionConfig::default(),
            mirror_path: PathBuf::from("confsync-mirror.db"),
        }
    }
}

/// Values that take precedence over the config file (flags or environment).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub mirror_path: Option<PathBuf>,
}

impl CliConfig {
    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.api_url {
            self.remote.base_url = url;
        }
        if let Some(key) = overrides.api_key {
            self.remote.api_key = key;
        }
        if let Some(path) = overrides.mirror_path {
            self.mirror_path = path;
        }
    }
}
