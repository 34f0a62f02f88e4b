//! In-memory connection endpoint.
//!
//! A [`Connection`] wraps one end of a `tokio::io::duplex` pipe and attaches
//! logical addressing to it. Failures from the pipe are rewritten into
//! [`NetError`]s that name the connection's own local and remote
//! [`Address`].
//!
//! ```text
//!   dialer                               accepter
//!   Connection (Side::Dialer)            Connection (Side::Acceptor)
//!     local  = dialer addr                 local  = listener addr
//!     remote = listener addr               remote = dialer addr
//!        │                                    │
//!        └──────── tokio::io::duplex ─────────┘
//! ```
//!
//! Closing is per side. Closing one side drops its pipe end, which the peer
//! observes as end-of-stream on read and a broken pipe on write.

use std::future::{poll_fn, Future};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::WaitForCancellationFutureOwned;

use crate::address::Address;
use crate::error::{Cause, NetError, NetResult};
use crate::signal::Signal;

/// Which caller a connection was handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Returned to the dialing caller.
    Dialer,
    /// Delivered to the accepting caller through a listener.
    Acceptor,
}

/// Pipe end shared between a [`Connection`] and whoever may close it.
#[derive(Debug)]
struct PipeEnd {
    stream: Mutex<Option<DuplexStream>>,
    closed: Signal,
}

impl PipeEnd {
    fn stream(&self) -> MutexGuard<'_, Option<DuplexStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> bool {
        let first = self.closed.fire();
        // Dropping the stream is what lets the peer see EOF.
        drop(self.stream().take());
        first
    }
}

/// Handle that closes a connection it does not own.
///
/// Listeners keep one for every connection they hand out so their close
/// signal can cascade to accepted connections.
#[derive(Debug, Clone)]
pub(crate) struct ConnCloser {
    end: Arc<PipeEnd>,
}

impl ConnCloser {
    pub(crate) fn close(&self) {
        if self.end.close() {
            tracing::trace!("connection closed by listener shutdown");
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.end.closed.is_fired()
    }
}

/// One endpoint of an in-memory duplex byte stream.
///
/// Implements [`AsyncRead`] and [`AsyncWrite`]; the inherent
/// [`read`](Connection::read) and [`write`](Connection::write) methods return
/// structured [`NetError`]s instead of `io::Error`.
#[derive(Debug)]
pub struct Connection {
    end: Arc<PipeEnd>,
    network: String,
    local: Address,
    remote: Address,
    side: Side,
    read_deadline: Option<Instant>,
    read_timer: Option<Pin<Box<Sleep>>>,
    read_closed: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    write_deadline: Option<Instant>,
    write_timer: Option<Pin<Box<Sleep>>>,
    write_closed: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl Connection {
    /// Create a linked pair: `(dialer side, acceptor side)`.
    ///
    /// The acceptor side has its addresses mirrored.
    pub(crate) fn pair(
        network: &str,
        local: Address,
        remote: Address,
        buffer_size: usize,
    ) -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(buffer_size.max(1));
        let dialer = Connection::new(a, network, local.clone(), remote.clone(), Side::Dialer);
        let acceptor = Connection::new(b, network, remote, local, Side::Acceptor);
        (dialer, acceptor)
    }

    fn new(
        stream: DuplexStream,
        network: &str,
        local: Address,
        remote: Address,
        side: Side,
    ) -> Self {
        Self {
            end: Arc::new(PipeEnd {
                stream: Mutex::new(Some(stream)),
                closed: Signal::new(),
            }),
            network: network.to_string(),
            local,
            remote,
            side,
            read_deadline: None,
            read_timer: None,
            read_closed: None,
            write_deadline: None,
            write_timer: None,
            write_closed: None,
        }
    }

    pub(crate) fn closer(&self) -> ConnCloser {
        ConnCloser {
            end: Arc::clone(&self.end),
        }
    }

    /// This endpoint's address.
    pub fn local_addr(&self) -> &Address {
        &self.local
    }

    /// The peer's address.
    pub fn remote_addr(&self) -> &Address {
        &self.remote
    }

    /// Network name the connection was dialed on.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Which caller received this endpoint.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Whether this endpoint was delivered through a listener.
    pub fn is_remote(&self) -> bool {
        self.side == Side::Acceptor
    }

    /// Whether this endpoint has been closed.
    pub fn is_closed(&self) -> bool {
        self.end.closed.is_fired()
    }

    /// Read into `buf`, returning the byte count. `Ok(0)` means the peer
    /// closed (or `buf` is empty).
    pub async fn read(&mut self, buf: &mut [u8]) -> NetResult<usize> {
        poll_fn(|cx| {
            let mut read_buf = ReadBuf::new(&mut *buf);
            self.poll_read_op(cx, &mut read_buf)
                .map_ok(|()| read_buf.filled().len())
        })
        .await
    }

    /// Write from `buf`, returning the byte count accepted by the pipe.
    pub async fn write(&mut self, buf: &[u8]) -> NetResult<usize> {
        poll_fn(|cx| self.poll_write_op(cx, buf)).await
    }

    /// Write the whole buffer.
    pub async fn write_all(&mut self, mut buf: &[u8]) -> NetResult<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Close this endpoint. Idempotent.
    pub fn close(&self) -> NetResult<()> {
        if self.end.close() {
            tracing::trace!(local = %self.local, remote = %self.remote, "connection closed");
        }
        Ok(())
    }

    /// Set the read deadline; `None` clears it.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) -> NetResult<()> {
        self.ensure_open("set_read_deadline")?;
        self.read_deadline = deadline;
        self.read_timer = None;
        Ok(())
    }

    /// Set the write deadline; `None` clears it.
    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) -> NetResult<()> {
        self.ensure_open("set_write_deadline")?;
        self.write_deadline = deadline;
        self.write_timer = None;
        Ok(())
    }

    /// Set both deadlines.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) -> NetResult<()> {
        self.set_read_deadline(deadline)?;
        self.set_write_deadline(deadline)
    }

    fn ensure_open(&self, op: &'static str) -> NetResult<()> {
        if self.is_closed() {
            return Err(NetError::new(op, self.network.as_str(), Cause::ConnectionClosed)
                .with_endpoints(&self.local, &self.local));
        }
        Ok(())
    }

    fn op_error(&self, op: &'static str, cause: Cause) -> NetError {
        NetError::new(op, self.network.as_str(), cause).with_endpoints(&self.local, &self.remote)
    }

    fn poll_read_op(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<NetResult<()>> {
        if expired(self.read_deadline) {
            return Poll::Ready(Err(self.op_error("read", Cause::TimedOut)));
        }
        let polled = match self.end.stream().as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => return Poll::Ready(Err(self.op_error("read", Cause::ConnectionClosed))),
        };
        match polled {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(self.op_error("read", e.into()))),
            Poll::Pending => self.poll_interrupt(cx, Direction::Read),
        }
    }

    fn poll_write_op(&mut self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<NetResult<usize>> {
        if expired(self.write_deadline) {
            return Poll::Ready(Err(self.op_error("write", Cause::TimedOut)));
        }
        let polled = match self.end.stream().as_mut() {
            Some(stream) => Pin::new(stream).poll_write(cx, buf),
            None => return Poll::Ready(Err(self.op_error("write", Cause::ConnectionClosed))),
        };
        match polled {
            Poll::Ready(Ok(n)) => Poll::Ready(Ok(n)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(self.op_error("write", e.into()))),
            Poll::Pending => self.poll_interrupt(cx, Direction::Write),
        }
    }

    /// While blocked on the pipe, watch for close and deadline expiry.
    ///
    /// Each direction keeps its own close wait so a reader and a writer in
    /// different tasks are both woken.
    fn poll_interrupt<T>(&mut self, cx: &mut Context<'_>, dir: Direction) -> Poll<NetResult<T>> {
        let op = dir.op();
        let closed = match dir {
            Direction::Read => &mut self.read_closed,
            Direction::Write => &mut self.write_closed,
        };
        let closed = closed.get_or_insert_with(|| Box::pin(self.end.closed.wait()));
        if closed.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(self.op_error(op, Cause::ConnectionClosed)));
        }
        let (deadline, timer) = match dir {
            Direction::Read => (self.read_deadline, &mut self.read_timer),
            Direction::Write => (self.write_deadline, &mut self.write_timer),
        };
        if let Some(at) = deadline {
            let timer = timer.get_or_insert_with(|| Box::pin(tokio::time::sleep_until(at)));
            if timer.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(self.op_error(op, Cause::TimedOut)));
            }
        }
        Poll::Pending
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    fn op(self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|at| Instant::now() >= at)
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.end.close();
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.get_mut().poll_read_op(cx, buf).map_err(io::Error::from)
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        self.get_mut().poll_write_op(cx, buf).map_err(io::Error::from)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        let this = self.get_mut();
        let polled = match this.end.stream().as_mut() {
            Some(stream) => Pin::new(stream).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        };
        polled.map_err(|e| this.op_error("write", e.into()).into())
    }
}
