//! In-process change fan-out.
//!
//! Delivery is synchronous on the publishing thread. Handlers are
//! snapshotted before delivery, so a handler may unsubscribe itself (or any
//! other handler) while a publish is in flight. A panicking handler is
//! logged and skipped; later handlers still run.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use confsync_types::{ConfigChange, Subscription};
use serde_json::Value;
use tracing::{debug, warn};

/// Callback invoked for every delivered change.
pub type ChangeHandler = Arc<dyn Fn(&ConfigChange) + Send + Sync>;

/// The publish/subscribe contract every change transport implements.
pub trait ChangeTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Delivers `change` to every current subscriber.
    fn publish(&self, change: &ConfigChange);

    /// Registers `handler` until the returned handle is unsubscribed.
    fn subscribe(&self, handler: ChangeHandler) -> Subscription;
}

#[derive(Default)]
struct Inner {
    handlers: RwLock<BTreeMap<u64, ChangeHandler>>,
    transports: RwLock<Vec<Arc<dyn ChangeTransport>>>,
    next_id: AtomicU64,
}

/// The in-process change transport.
///
/// Cloning is cheap and every clone shares the same subscriber set.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Inner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes "`key` changed to `value`".
    pub fn notify(&self, key: impl Into<String>, value: Value) {
        self.publish(&ConfigChange::new(key, value));
    }

    /// Subscribes to changes of a single key.
    pub fn on_change(
        &self,
        key: impl Into<String>,
        handler: impl Fn(&ConfigChange) + Send + Sync + 'static,
    ) -> Subscription {
        let key = key.into();
        self.subscribe(Arc::new(move |change: &ConfigChange| {
            if change.key == key {
                handler(change);
            }
        }))
    }

    /// Forwards every later publish to `transport` as well.
    pub fn attach(&self, transport: Arc<dyn ChangeTransport>) {
        debug!("Attached change transport: {}", transport.name());
        self.inner
            .transports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transport);
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn remove(inner: &Weak<Inner>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            inner
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        }
    }
}

impl ChangeTransport for ChangeNotifier {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn publish(&self, change: &ConfigChange) {
        let handlers: Vec<ChangeHandler> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(change))).is_err() {
                warn!("Change handler panicked while handling key '{}'", change.key);
            }
        }

        let transports = self
            .inner
            .transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for transport in transports {
            transport.publish(change);
        }
    }

    fn subscribe(&self, handler: ChangeHandler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handler);

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || Self::remove(&inner, id))
    }
}
