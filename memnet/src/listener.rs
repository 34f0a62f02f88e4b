//! Listener rendezvous and lifecycle.
//!
//! A listener owns a single-slot rendezvous channel. A dial creates a
//! connection pair and places the acceptor side into the slot; an accept
//! takes it out. Because the slot holds one connection, a second concurrent
//! dial waits behind the first until an accept makes room (or its own
//! [`DialContext`] finishes).
//!
//! ## Lifecycle
//!
//! ```text
//!  listen ──► registry.insert ──► spawn removal task ─┐
//!         └─► spawn cascade task ────────────────────┐│
//!                                                    ││
//!  close ──► done.fire() ──► cascade: close accepted ┘│
//!        │               └─► removal: drop entry, ────┘
//!        │                   removed.fire()
//!        └─► join both tasks, wait for `removed`
//! ```
//!
//! `close` returns only after the registry entry is gone, so a `listen` on
//! the same name that starts afterwards never sees the old listener.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::address::Address;
use crate::cancel::DialContext;
use crate::connection::{ConnCloser, Connection};
use crate::error::{Cause, NetError, NetResult};
use crate::signal::Signal;

/// State shared by a listener handle, its registry entry, and its
/// background tasks.
#[derive(Debug)]
pub(crate) struct ListenerShared {
    addr: Address,
    buffer_size: usize,
    slot_tx: mpsc::Sender<Connection>,
    slot_rx: tokio::sync::Mutex<mpsc::Receiver<Connection>>,
    pub(crate) done: Signal,
    pub(crate) removed: Signal,
    handed_out: Mutex<Vec<ConnCloser>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ListenerShared {
    /// Create the listener state and start its close-cascade task.
    ///
    /// Must be called inside a tokio runtime.
    pub(crate) fn start(addr: Address, buffer_size: usize) -> Arc<Self> {
        let (slot_tx, slot_rx) = mpsc::channel(1);
        let shared = Arc::new(Self {
            addr,
            buffer_size,
            slot_tx,
            slot_rx: tokio::sync::Mutex::new(slot_rx),
            done: Signal::new(),
            removed: Signal::new(),
            handed_out: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        });

        let cascade = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                shared.done.wait().await;
                shared.close_handed_out();
            }
        });
        shared.supervise(cascade);
        shared
    }

    pub(crate) fn addr(&self) -> &Address {
        &self.addr
    }

    /// Track a background task so `close` can join it.
    pub(crate) fn supervise(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    fn handed_out(&self) -> MutexGuard<'_, Vec<ConnCloser>> {
        self.handed_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an acceptor-side connection for the close cascade.
    fn track(&self, closer: ConnCloser) {
        let mut handed_out = self.handed_out();
        // Checked under the lock so a close racing with this dial either
        // sees the entry or we see the fired signal.
        if self.done.is_fired() {
            closer.close();
            return;
        }
        handed_out.retain(|c| !c.is_closed());
        handed_out.push(closer);
    }

    fn close_handed_out(&self) {
        let closers = std::mem::take(&mut *self.handed_out());
        tracing::debug!(
            listener = %self.addr,
            connections = closers.len(),
            "closing connections handed out by listener"
        );
        for closer in closers {
            closer.close();
        }
    }

    fn closed_error(&self, op: &'static str) -> NetError {
        NetError::new(op, self.addr.network(), Cause::ListenerClosed)
            .with_endpoints(&self.addr, &self.addr)
    }

    /// Run the dial side of the rendezvous.
    ///
    /// Returns the dialer's connection once the acceptor side is in the
    /// slot. Without a context the wait is unbounded.
    pub(crate) async fn dial(
        &self,
        ctx: Option<&DialContext>,
        network: &str,
        local: Address,
        remote: Address,
    ) -> NetResult<Connection> {
        let (local_conn, remote_conn) =
            Connection::pair(network, local.clone(), remote.clone(), self.buffer_size);
        self.track(remote_conn.closer());

        let cancelled = async {
            match ctx {
                Some(ctx) => ctx.done().await,
                None => std::future::pending().await,
            }
        };

        // Dropping the pending send drops `remote_conn`, which closes it.
        tokio::select! {
            biased;
            _ = self.done.wait() => {
                Err(NetError::new("dial", network, Cause::ListenerClosed)
                    .with_endpoints(&local, &remote))
            }
            cause = cancelled => {
                local_conn.close()?;
                tracing::debug!(%local, %remote, %cause, "dial cancelled before rendezvous");
                Err(NetError::new("dial", network, cause.into()).with_endpoints(&local, &remote))
            }
            sent = self.slot_tx.send(remote_conn) => match sent {
                Ok(()) => {
                    tracing::debug!(%local, %remote, "dial handed off");
                    Ok(local_conn)
                }
                Err(_) => Err(NetError::new("dial", network, Cause::ListenerClosed)
                    .with_endpoints(&local, &remote)),
            },
        }
    }

    async fn accept(&self) -> NetResult<Connection> {
        if self.done.is_fired() {
            return Err(self.closed_error("accept"));
        }
        let mut slot = tokio::select! {
            biased;
            _ = self.done.wait() => return Err(self.closed_error("accept")),
            slot = self.slot_rx.lock() => slot,
        };
        tokio::select! {
            biased;
            _ = self.done.wait() => Err(self.closed_error("accept")),
            conn = slot.recv() => conn.ok_or_else(|| self.closed_error("accept")),
        }
    }

    async fn close(&self) {
        if self.done.fire() {
            tracing::debug!(listener = %self.addr, "listener closing");
        }
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::warn!(listener = %self.addr, error = %e, "listener task panicked");
                }
            }
        }
        // A concurrent close may have taken the handles; the signal still
        // guarantees the registry entry is gone.
        self.removed.wait().await;
    }
}

/// A bound in-memory listener.
///
/// Dropping the handle fires the close signal without waiting for the
/// registry entry to disappear; call [`close`](MemListener::close) for a
/// synchronous teardown.
#[derive(Debug)]
pub struct MemListener {
    shared: Arc<ListenerShared>,
}

impl MemListener {
    pub(crate) fn new(shared: Arc<ListenerShared>) -> Self {
        Self { shared }
    }

    /// Wait for the next dialed connection.
    ///
    /// Fails with [`ErrorKind::ListenerClosed`](crate::ErrorKind::ListenerClosed)
    /// once the listener is closed. Closing is the only way to cancel it.
    #[instrument(skip(self), fields(listener = %self.shared.addr))]
    pub async fn accept(&self) -> NetResult<Connection> {
        let conn = self.shared.accept().await?;
        tracing::debug!(remote = %conn.remote_addr(), "accepted connection");
        Ok(conn)
    }

    /// Close the listener. Idempotent.
    ///
    /// Wakes pending accepts, closes every connection handed out through
    /// this listener, and returns once the name is free again.
    #[instrument(skip(self), fields(listener = %self.shared.addr))]
    pub async fn close(&self) -> NetResult<()> {
        self.shared.close().await;
        Ok(())
    }

    /// The bound address.
    pub fn addr(&self) -> &Address {
        self.shared.addr()
    }

    /// Whether the close signal has fired.
    pub fn is_closed(&self) -> bool {
        self.shared.done.is_fired()
    }
}

impl Drop for MemListener {
    fn drop(&mut self) {
        self.shared.done.fire();
    }
}
