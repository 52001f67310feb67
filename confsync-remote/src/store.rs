//! Settings store abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use confsync_types::{ConfigEntry, Subscription};

use crate::error::RemoteResult;

/// Callback invoked for every row delivered by the change feed.
pub type ChangeCallback = Arc<dyn Fn(ConfigEntry) + Send + Sync>;

/// The authoritative settings table.
///
/// Rows are `(key, value, updated_at)`. Upserts are keyed by `key`;
/// conflicting writers from different processes are resolved by the
/// backend (last write by timestamp wins), not by the adapter.
#[async_trait]
pub trait RemoteConfigStore: Send + Sync {
    /// Returns the name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Lightweight existence check used to decide connectivity.
    async fn probe(&self) -> RemoteResult<()>;

    /// Reads one row. A missing key is `Ok(None)`, not an error.
    async fn read(&self, key: &str) -> RemoteResult<Option<ConfigEntry>>;

    /// Inserts or overwrites the row for `entry.key`. Returns the row as
    /// stored by the backend.
    async fn upsert(&self, entry: &ConfigEntry) -> RemoteResult<ConfigEntry>;

    /// Opens the change feed. Each changed row is delivered in full to
    /// `on_change` until the returned subscription is cancelled.
    async fn subscribe(&self, on_change: ChangeCallback) -> RemoteResult<Subscription>;
}
