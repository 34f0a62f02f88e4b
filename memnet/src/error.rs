//! Structured network errors.
//!
//! Every failure is reported as a [`NetError`]: the operation that failed,
//! the network it ran on, the endpoints involved, and a [`Cause`]. Callers
//! branch on [`NetError::kind`] instead of matching message text.

use std::io;

use crate::address::Address;
use crate::cancel::CancelCause;

/// Which side of an operation an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrRole {
    /// The caller's own endpoint.
    Local,
    /// The peer endpoint.
    Remote,
}

impl std::fmt::Display for AddrRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrRole::Local => f.write_str("local"),
            AddrRole::Remote => f.write_str("remote"),
        }
    }
}

/// Underlying reason for a [`NetError`].
#[derive(Debug, thiserror::Error)]
pub enum Cause {
    /// A listener is already bound to the name.
    #[error("addr unavailable")]
    AddressUnavailable,

    /// No listener is bound to the remote name.
    #[error("unknown remote address")]
    UnknownAddress,

    /// The address requests a transport variant the network does not provide.
    #[error("incompatible network & {0} address")]
    IncompatibleAddress(AddrRole),

    /// Neither the in-memory transport nor the real network knows the name.
    #[error("unknown network")]
    UnknownNetwork,

    /// The dial context finished before the rendezvous.
    #[error(transparent)]
    Cancelled(#[from] CancelCause),

    /// The listener's close signal fired.
    #[error("listener closed")]
    ListenerClosed,

    /// The connection was closed locally or by its listener.
    #[error("use of closed connection")]
    ConnectionClosed,

    /// A read or write deadline passed.
    #[error("i/o timeout")]
    TimedOut,

    /// Failure reported by the underlying stream or socket.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Cause {
    /// Tag for this cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Cause::AddressUnavailable => ErrorKind::AddressUnavailable,
            Cause::UnknownAddress => ErrorKind::UnknownAddress,
            Cause::IncompatibleAddress(_) => ErrorKind::IncompatibleAddress,
            Cause::UnknownNetwork => ErrorKind::UnknownNetwork,
            Cause::Cancelled(_) => ErrorKind::Cancelled,
            Cause::ListenerClosed => ErrorKind::ListenerClosed,
            Cause::ConnectionClosed => ErrorKind::ConnectionClosed,
            Cause::TimedOut => ErrorKind::TimedOut,
            Cause::Io(_) => ErrorKind::Io,
        }
    }
}

/// Error classification for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Listen on a name that is already bound.
    AddressUnavailable,
    /// Dial to a name with no active listener.
    UnknownAddress,
    /// Buffered address used against the unbuffered network.
    IncompatibleAddress,
    /// Network name not recognised.
    UnknownNetwork,
    /// Dial cancellation or timeout fired before the rendezvous.
    Cancelled,
    /// Accept, or a pending dial, observed the listener closing.
    ListenerClosed,
    /// Operation on a closed connection.
    ConnectionClosed,
    /// Deadline exceeded.
    TimedOut,
    /// Pass-through I/O failure.
    Io,
}

/// Structured error for every listen, dial, accept and stream operation.
#[derive(Debug)]
pub struct NetError {
    op: &'static str,
    network: String,
    local: Option<Address>,
    remote: Option<Address>,
    cause: Cause,
}

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;

impl NetError {
    pub(crate) fn new(op: &'static str, network: impl Into<String>, cause: Cause) -> Self {
        Self {
            op,
            network: network.into(),
            local: None,
            remote: None,
            cause,
        }
    }

    /// Overwrite the source and destination addresses.
    pub(crate) fn with_endpoints(mut self, local: &Address, remote: &Address) -> Self {
        self.local = Some(local.clone());
        self.remote = Some(remote.clone());
        self
    }

    pub(crate) fn with_local(mut self, local: &Address) -> Self {
        self.local = Some(local.clone());
        self
    }

    pub(crate) fn with_remote(mut self, remote: &Address) -> Self {
        self.remote = Some(remote.clone());
        self
    }

    /// Operation that failed, e.g. `"dial"` or `"read"`.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Network name as supplied by the caller.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Source address, if known.
    pub fn local_addr(&self) -> Option<&Address> {
        self.local.as_ref()
    }

    /// Destination address, if known.
    pub fn remote_addr(&self) -> Option<&Address> {
        self.remote.as_ref()
    }

    /// Underlying cause.
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    /// Whether the error is a deadline or dial-timeout expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.cause,
            Cause::TimedOut | Cause::Cancelled(CancelCause::DeadlineExceeded)
        )
    }
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.op)?;
        if !self.network.is_empty() {
            write!(f, " {}", self.network)?;
        }
        if let Some(local) = &self.local {
            write!(f, " {}", local.name())?;
        }
        if let Some(remote) = &self.remote {
            let sep = if self.local.is_some() { "->" } else { " " };
            write!(f, "{}{}", sep, remote.name())?;
        }
        write!(f, ": {}", self.cause)
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl From<NetError> for io::Error {
    fn from(err: NetError) -> Self {
        let kind = match &err.cause {
            Cause::AddressUnavailable => io::ErrorKind::AddrInUse,
            Cause::UnknownAddress => io::ErrorKind::ConnectionRefused,
            Cause::IncompatibleAddress(_) => io::ErrorKind::InvalidInput,
            Cause::UnknownNetwork => io::ErrorKind::Unsupported,
            Cause::Cancelled(_) | Cause::TimedOut => io::ErrorKind::TimedOut,
            Cause::ListenerClosed => io::ErrorKind::ConnectionAborted,
            Cause::ConnectionClosed => io::ErrorKind::NotConnected,
            Cause::Io(inner) => inner.kind(),
        };
        io::Error::new(kind, err)
    }
}
