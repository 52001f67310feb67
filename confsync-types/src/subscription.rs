//! Explicit subscription handles.

use std::fmt;
use std::sync::{Mutex, PoisonError};

type CancelFn = Box<dyn FnOnce() + Send>;

/// Handle returned by every subscribe-style API.
///
/// Dropping the handle does NOT cancel the subscription; callers end it
/// with [`Subscription::unsubscribe`]. Unsubscribing is idempotent and may
/// be called from any thread, including from inside the handler it cancels.
#[must_use = "a subscription stays active until unsubscribe() is called"]
pub struct Subscription {
    cancel: Mutex<Option<CancelFn>>,
}

impl Subscription {
    /// Wraps the transport-specific cancellation logic.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Ends the subscription. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Returns true once `unsubscribe` has run.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
