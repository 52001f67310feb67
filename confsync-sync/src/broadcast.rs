//! Cross-window change transport over `tokio::sync::broadcast`.

use std::panic::{self, AssertUnwindSafe};

use confsync_types::{ConfigChange, Subscription};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::notifier::{ChangeHandler, ChangeTransport};

const DEFAULT_CAPACITY: usize = 256;

/// A change transport whose subscribers may live on other tasks.
///
/// Each subscription runs its own receiver task; a subscriber that falls
/// more than `capacity` messages behind skips the oldest ones and logs a
/// warning. Subscribing requires a running tokio runtime.
#[derive(Clone)]
pub struct BroadcastTransport {
    sender: broadcast::Sender<ConfigChange>,
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Raw receiver for consumers that prefer to drive the channel themselves.
    pub fn receiver(&self) -> broadcast::Receiver<ConfigChange> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ChangeTransport for BroadcastTransport {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&self, change: &ConfigChange) {
        // No receivers is not an error.
        let _ = self.sender.send(change.clone());
    }

    fn subscribe(&self, handler: ChangeHandler) -> Subscription {
        let Ok(runtime) = Handle::try_current() else {
            warn!("Broadcast subscription requested outside a tokio runtime; ignoring");
            return Subscription::noop();
        };

        let mut receiver = self.sender.subscribe();
        let task = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        if panic::catch_unwind(AssertUnwindSafe(|| handler(&change))).is_err() {
                            warn!("Broadcast handler panicked while handling key '{}'", change.key);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Broadcast subscriber lagged; skipped {} changes", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription::new(move || task.abort())
    }
}
