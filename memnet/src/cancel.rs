//! Dial cancellation.
//!
//! A [`DialContext`] bounds how long a dial may wait at a listener's
//! rendezvous slot, either through an explicit [`CancelToken`], a deadline,
//! or both.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a dial context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelCause {
    /// The cancellation token was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cooperative cancellation handle.
///
/// Clones share state: cancelling any clone cancels them all. Waiting on
/// [`cancelled`](CancellationToken::cancelled) and dropping the future
/// leaves no waiter behind.
pub type CancelToken = CancellationToken;

/// Cancellation scope for a dial.
///
/// The default context never finishes, which makes a dial wait at the
/// rendezvous slot for as long as it takes an accepter to make room.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memnet::{CancelToken, DialContext};
///
/// let token = CancelToken::new();
/// let ctx = DialContext::new()
///     .with_token(token.clone())
///     .with_timeout(Duration::from_millis(250));
/// assert!(ctx.deadline().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DialContext {
    deadline: Option<Instant>,
    token: Option<CancelToken>,
}

impl DialContext {
    /// Context with neither deadline nor token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Attach a cancellation token.
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cause if the context is already done.
    pub fn err(&self) -> Option<CancelCause> {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is done.
    ///
    /// Never resolves for a context without deadline and token.
    pub async fn done(&self) -> CancelCause {
        match (&self.token, self.deadline) {
            (None, None) => std::future::pending().await,
            (Some(token), None) => {
                token.cancelled().await;
                CancelCause::Cancelled
            }
            (None, Some(deadline)) => {
                tokio::time::sleep_until(deadline).await;
                CancelCause::DeadlineExceeded
            }
            (Some(token), Some(deadline)) => tokio::select! {
                biased;
                _ = token.cancelled() => CancelCause::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
            },
        }
    }
}
