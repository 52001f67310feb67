//! The settings coordinator.
//!
//! `SyncCoordinator` is the single logical owner of mutable settings state.
//! Every mutation (local writes, server pushes, reconciliation) runs under
//! one async lock, so the mirror and the notifications observed by
//! consumers always follow the same order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use confsync_cache::{LocalMirror, MirroredEntry};
use confsync_remote::{ChangeCallback, RemoteConfigStore, RemoteError, RemoteResult};
use confsync_types::{ConfigChange, ConfigEntry, ConnectivityState, Subscription, WriteOutcome};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::notifier::{ChangeNotifier, ChangeTransport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The open push subscription and the task that applies its events.
struct Feed {
    subscription: Subscription,
    applier: JoinHandle<()>,
}

/// Connectivity-aware owner of the settings table.
///
/// Reads are served from the local mirror and never touch the network.
/// Writes go to the remote store while it is reachable and to the mirror in
/// every case. While degraded, every write re-probes the store so the
/// coordinator heals itself without a retry queue.
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteConfigStore>,
    mirror: Arc<dyn LocalMirror>,
    notifier: ChangeNotifier,
    config: SyncConfig,
    state: watch::Sender<ConnectivityState>,
    /// Serializes every mutation of the mirror.
    write_lock: tokio::sync::Mutex<()>,
    /// Timestamps of our own upserts whose echo must not be republished,
    /// oldest first per key.
    own_writes: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    feed: Mutex<Option<Feed>>,
}

impl SyncCoordinator {
    /// Creates a coordinator with a fresh notifier.
    pub fn new(
        remote: Arc<dyn RemoteConfigStore>,
        mirror: Arc<dyn LocalMirror>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Self::with_notifier(remote, mirror, ChangeNotifier::new(), config)
    }

    /// Creates a coordinator that publishes through an existing notifier.
    pub fn with_notifier(
        remote: Arc<dyn RemoteConfigStore>,
        mirror: Arc<dyn LocalMirror>,
        notifier: ChangeNotifier,
        config: SyncConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectivityState::Degraded);
        Arc::new(Self {
            remote,
            mirror,
            notifier,
            config,
            state,
            write_lock: tokio::sync::Mutex::new(()),
            own_writes: Mutex::new(HashMap::new()),
            feed: Mutex::new(None),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Probes the remote store and loads the known keys.
    ///
    /// Never fails: an unreachable store leaves the coordinator degraded
    /// and serving whatever the mirror holds.
    pub async fn start(self: &Arc<Self>) -> ConnectivityState {
        let _guard = self.write_lock.lock().await;

        if let Err(e) = self.remote_call(self.remote.probe()).await {
            if e.is_unavailable() {
                self.degrade(&e);
            } else {
                warn!("Remote store refused probe: {}", e);
            }
            info!(
                "Starting from local mirror ({} entries)",
                self.mirror.entries().len()
            );
            return self.connectivity();
        }

        if !self.connect().await {
            return ConnectivityState::Degraded;
        }

        for key in &self.config.known_keys {
            match self.remote_call(self.remote.read(key)).await {
                Ok(Some(row)) => self.mirror_remote_row(row),
                Ok(None) => debug!("Remote has no value for '{}'", key),
                Err(e) if e.is_unavailable() => {
                    self.degrade(&e);
                    return ConnectivityState::Degraded;
                }
                Err(e) => warn!("Skipping '{}' during load: {}", key, e),
            }
        }

        info!(
            "Sync started against '{}' backend ({} known keys)",
            self.remote.backend_name(),
            self.config.known_keys.len()
        );
        ConnectivityState::Connected
    }

    /// Closes the push subscription and stops applying server events.
    pub fn stop(&self) {
        if let Some(feed) = lock(&self.feed).take() {
            feed.subscription.unsubscribe();
            feed.applier.abort();
            debug!("Push subscription closed");
        }
    }

    // ── Consumer API ─────────────────────────────────────────────

    /// Returns the current value of `key` from the mirror.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.mirror.get(key).map(|mirrored| mirrored.entry.value)
    }

    /// Returns the mirrored entry for `key`, including its sync state.
    pub fn entry(&self, key: &str) -> Option<MirroredEntry> {
        self.mirror.get(key)
    }

    /// Snapshot of every mirrored entry.
    pub fn entries(&self) -> Vec<MirroredEntry> {
        self.mirror.entries()
    }

    /// Writes `value` under `key`.
    ///
    /// Returns [`WriteOutcome::Synced`] when the remote store accepted the
    /// write and [`WriteOutcome::SavedLocally`] when only the mirror has it.
    ///
    /// Fails when the mirror cannot be written, or with
    /// [`SyncError::Remote`] when a reachable store refuses the write. A
    /// refused write leaves the mirror and the connectivity state untouched.
    pub async fn set(self: &Arc<Self>, key: &str, value: Value) -> SyncResult<WriteOutcome> {
        let _guard = self.write_lock.lock().await;

        let previous = self.mirror.get(key);
        let entry = ConfigEntry::superseding(previous.as_ref().map(|m| &m.entry), key, value);

        if !self.connectivity().is_connected() {
            match self.remote_call(self.remote.probe()).await {
                Ok(()) => {
                    self.connect().await;
                }
                Err(e) => debug!("Store still not usable: {}", e),
            }
        }

        if self.connectivity().is_connected() {
            match self.remote_call(self.remote.upsert(&entry)).await {
                Ok(stored) => {
                    self.expect_echo(&stored.key, stored.updated_at);
                    self.mirror.put(&MirroredEntry::confirmed(stored.clone()))?;
                    self.notifier.publish(&stored.to_change());
                    return Ok(WriteOutcome::Synced);
                }
                Err(e) if e.is_unavailable() => self.degrade(&e),
                Err(e) => {
                    warn!("Remote store refused write to '{}': {}", key, e);
                    return Err(e.into());
                }
            }
        }

        self.mirror.put(&MirroredEntry::pending(entry.clone()))?;
        self.notifier.publish(&entry.to_change());
        debug!("Saved '{}' locally; not yet synced", key);
        Ok(WriteOutcome::SavedLocally)
    }

    /// Subscribes to changes of a single key.
    pub fn on_change(
        &self,
        key: impl Into<String>,
        handler: impl Fn(&ConfigChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.on_change(key, handler)
    }

    /// Subscribes to changes of every key.
    pub fn on_any_change(
        &self,
        handler: impl Fn(&ConfigChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.subscribe(Arc::new(handler))
    }

    /// The notifier every change is published on.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    // ── Connectivity ─────────────────────────────────────────────

    pub fn connectivity(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Receiver that observes every connectivity transition.
    pub fn watch_connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectivityState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!("Connectivity changed to {}", next);
        }
    }

    fn degrade(&self, cause: &RemoteError) {
        if self.connectivity().is_connected() {
            warn!("Remote store unreachable, degrading: {}", cause);
        } else {
            debug!("Remote store unreachable: {}", cause);
        }
        self.set_state(ConnectivityState::Degraded);
    }

    /// Completes a Degraded -> Connected upgrade after a successful probe.
    /// Must be called with the write lock held.
    async fn connect(self: &Arc<Self>) -> bool {
        if let Err(e) = self.reconcile_pending().await {
            warn!("Reconciliation failed: {}", e);
            self.set_state(ConnectivityState::Degraded);
            return false;
        }
        match self.open_feed().await {
            Ok(()) => {}
            Err(e) if e.is_unavailable() => {
                self.degrade(&e);
                return false;
            }
            Err(e) => warn!("Remote store refused push subscription: {}", e),
        }
        self.set_state(ConnectivityState::Connected);
        true
    }

    async fn remote_call<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        match tokio::time::timeout(self.config.io_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    // ── Reconciliation ───────────────────────────────────────────

    /// Pushes or discards entries written while degraded, last write wins.
    /// Entries the store refuses stay pending; an unreachable store aborts
    /// the pass.
    async fn reconcile_pending(&self) -> SyncResult<()> {
        let pending = self.mirror.pending();
        if pending.is_empty() {
            return Ok(());
        }
        info!("Reconciling {} locally saved entries", pending.len());

        for local in pending {
            let key = local.entry.key.clone();
            match self.reconcile_entry(local.entry).await {
                Err(SyncError::Remote(e)) if !e.is_unavailable() => {
                    warn!("Leaving '{}' pending, store refused it: {}", key, e);
                }
                other => other?,
            }
        }
        Ok(())
    }

    async fn reconcile_entry(&self, local: ConfigEntry) -> SyncResult<()> {
        let remote = self.remote_call(self.remote.read(&local.key)).await?;
        match remote {
            Some(row) if !local.is_newer_than(&row) => {
                debug!("Remote value for '{}' is newer; discarding local write", row.key);
                self.mirror.put(&MirroredEntry::confirmed(row.clone()))?;
                self.notifier.publish(&row.to_change());
            }
            _ => {
                let stored = self.remote_call(self.remote.upsert(&local)).await?;
                self.expect_echo(&stored.key, stored.updated_at);
                self.mirror.put(&MirroredEntry::confirmed(stored.clone()))?;
                if stored.value != local.value {
                    self.notifier.publish(&stored.to_change());
                }
            }
        }
        Ok(())
    }

    /// Mirrors a row read during start, publishing only real changes.
    fn mirror_remote_row(&self, row: ConfigEntry) {
        let changed = self
            .mirror
            .get(&row.key)
            .is_none_or(|current| current.entry.value != row.value);
        if let Err(e) = self.mirror.put(&MirroredEntry::confirmed(row.clone())) {
            warn!("Failed to mirror '{}': {}", row.key, e);
            return;
        }
        if changed {
            self.notifier.publish(&row.to_change());
        }
    }

    // ── Push feed ────────────────────────────────────────────────

    async fn open_feed(self: &Arc<Self>) -> RemoteResult<()> {
        if lock(&self.feed).is_some() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ConfigEntry>();
        let callback: ChangeCallback = Arc::new(move |entry: ConfigEntry| {
            let _ = tx.send(entry);
        });
        let subscription = self.remote_call(self.remote.subscribe(callback)).await?;

        let coordinator: Weak<Self> = Arc::downgrade(self);
        let applier = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.apply_push(entry).await;
            }
        });

        *lock(&self.feed) = Some(Feed {
            subscription,
            applier,
        });
        debug!("Push subscription opened");
        Ok(())
    }

    /// Applies a server-initiated change. The remote is authoritative, so
    /// the mirror is overwritten and the change republished even when the
    /// value is unchanged; only echoes of our own upserts are skipped.
    async fn apply_push(&self, entry: ConfigEntry) {
        let _guard = self.write_lock.lock().await;

        if self.take_echo(&entry) {
            debug!("Skipping echo of own write to '{}'", entry.key);
            return;
        }

        if let Err(e) = self.mirror.put(&MirroredEntry::confirmed(entry.clone())) {
            warn!("Failed to mirror pushed change to '{}': {}", entry.key, e);
        }
        self.notifier.publish(&entry.to_change());
    }

    /// Records an upsert whose echo is still in flight. Callers hold the
    /// write lock, so the applier cannot see the echo before this runs.
    fn expect_echo(&self, key: &str, updated_at: DateTime<Utc>) {
        lock(&self.own_writes)
            .entry(key.to_string())
            .or_default()
            .push(updated_at);
    }

    /// Consumes the marker matching `entry`. Older markers for the same key
    /// are dropped too: a polled feed only ever shows the latest row, so
    /// their echoes may never arrive.
    fn take_echo(&self, entry: &ConfigEntry) -> bool {
        let mut own = lock(&self.own_writes);
        let Some(pending) = own.get_mut(&entry.key) else {
            return false;
        };
        if !pending.contains(&entry.updated_at) {
            return false;
        }
        pending.retain(|ts| *ts > entry.updated_at);
        if pending.is_empty() {
            own.remove(&entry.key);
        }
        true
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}
