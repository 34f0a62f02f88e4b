//! One-shot broadcast event.
//!
//! A [`Signal`] starts unset and can be fired exactly once. Every waiter,
//! past or future, observes the fired state. It backs the listener close
//! signal, the registry-removal acknowledgement and connection close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Single-assignment flag with waiters.
///
/// Clones share the same underlying event. Waiting futures deregister when
/// dropped, so abandoned waits leave nothing behind.
#[derive(Debug, Clone, Default)]
pub(crate) struct Signal {
    token: CancellationToken,
    first: Arc<AtomicBool>,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fire the signal, waking every waiter.
    ///
    /// Returns `true` for the call that actually fired it and `false` for
    /// every later call.
    pub(crate) fn fire(&self) -> bool {
        if self.first.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires.
    pub(crate) fn wait(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }

    #[cfg(test)]
    fn token(&self) -> &CancellationToken {
        &self.token
    }
}
