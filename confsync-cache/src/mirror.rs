//! The mirror contract.

use confsync_types::ConfigEntry;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// Where a mirrored value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorState {
    /// Previously confirmed by the remote store.
    Confirmed,
    /// Written locally while degraded; not yet reconciled.
    Pending,
}

/// A configuration entry as held by the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirroredEntry {
    pub entry: ConfigEntry,
    pub state: MirrorState,
}

impl MirroredEntry {
    pub fn confirmed(entry: ConfigEntry) -> Self {
        Self {
            entry,
            state: MirrorState::Confirmed,
        }
    }

    pub fn pending(entry: ConfigEntry) -> Self {
        Self {
            entry,
            state: MirrorState::Pending,
        }
    }

    pub fn key(&self) -> &str {
        &self.entry.key
    }

    pub fn is_pending(&self) -> bool {
        self.state == MirrorState::Pending
    }
}

/// Persistent key/value mirror of configuration entries.
///
/// All methods are synchronous. Reads never fail: a row that cannot be
/// decoded is reported as missing and logged.
pub trait LocalMirror: Send + Sync {
    /// Returns the mirrored entry for `key`, if any.
    fn get(&self, key: &str) -> Option<MirroredEntry>;

    /// Inserts or replaces the entry for its key.
    fn put(&self, entry: &MirroredEntry) -> CacheResult<()>;

    /// Removes the entry for `key`. Removing a missing key is a no-op.
    fn delete(&self, key: &str) -> CacheResult<()>;

    /// Returns every decodable entry, ordered by key.
    fn entries(&self) -> Vec<MirroredEntry>;

    /// Returns the entries still waiting for reconciliation.
    fn pending(&self) -> Vec<MirroredEntry> {
        self.entries().into_iter().filter(MirroredEntry::is_pending).collect()
    }
}
