use std::sync::Arc;

use anyhow::{Context, Result};
use confsync_cache::{MirroredEntry, SqliteMirror};
use confsync_remote::{RestConfigStore, RestIdentityService};
use confsync_session::SessionResolver;
use confsync_sync::SyncCoordinator;

use crate::config::CliConfig;

/// The library stack wired against one backend and one mirror file.
pub struct App {
    pub coordinator: Arc<SyncCoordinator>,
    pub resolver: SessionResolver,
}

impl App {
    pub fn open(config: &CliConfig) -> Result<Self> {
        let mirror = Arc::new(
            SqliteMirror::open(&config.mirror_path).with_context(|| {
                format!("failed to open mirror at {}", config.mirror_path.display())
            })?,
        );
        let remote = Arc::new(
            RestConfigStore::new(config.remote.clone()).context("failed to create settings store")?,
        );
        let identity = Arc::new(
            RestIdentityService::new(config.remote.clone())
                .context("failed to create identity service")?,
        );

        let coordinator = SyncCoordinator::new(remote, mirror.clone(), config.sync.clone());
        let resolver = SessionResolver::new(
            identity,
            mirror,
            coordinator.watch_connectivity(),
            config.session.clone(),
        );
        Ok(Self {
            coordinator,
            resolver,
        })
    }
}

/// One line per entry: key, sync state, last write time.
pub fn render_entries(entries: &[MirroredEntry]) -> String {
    let width = entries.iter().map(|e| e.key().len()).max().unwrap_or(0);
    entries
        .iter()
        .map(|e| {
            let state = if e.is_pending() { "pending" } else { "synced" };
            format!(
                "{:<width$}  {:<7}  {}",
                e.key(),
                state,
                e.entry.updated_at.to_rfc3339(),
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
