//! Real-network fallback and the dispatch types it shares with the
//! in-memory path.
//!
//! Networks the provider does not recognise as in-memory are handed here
//! verbatim. Only the TCP family is understood; anything else is an
//! [`ErrorKind::UnknownNetwork`](crate::ErrorKind::UnknownNetwork).

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use crate::address::Address;
use crate::cancel::DialContext;
use crate::connection::Connection;
use crate::error::{Cause, NetError, NetResult};
use crate::listener::MemListener;

/// Address-family filter for the TCP networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    fn of(network: &str) -> Option<Self> {
        match network {
            "tcp" => Some(Family::Any),
            "tcp4" => Some(Family::V4),
            "tcp6" => Some(Family::V6),
            _ => None,
        }
    }

    fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

pub(crate) fn describe(network: &str, addr: SocketAddr) -> Address {
    Address::with_network(network, addr.to_string())
}

async fn resolve(
    op: &'static str,
    network: &str,
    family: Family,
    address: &str,
) -> NetResult<Vec<SocketAddr>> {
    let target = Address::with_network(network, address);
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(address)
        .await
        .map_err(|e| NetError::new(op, network, e.into()).with_remote(&target))?
        .filter(|a| family.admits(a))
        .collect();
    if addrs.is_empty() {
        let e = io::Error::new(io::ErrorKind::AddrNotAvailable, "no suitable address found");
        return Err(NetError::new(op, network, e.into()).with_remote(&target));
    }
    Ok(addrs)
}

/// Bind a real listener.
pub(crate) async fn listen(network: &str, address: &str) -> NetResult<TcpListener> {
    let Some(family) = Family::of(network) else {
        return Err(NetError::new("listen", network, Cause::UnknownNetwork)
            .with_local(&Address::with_network(network, address)));
    };
    let addrs = resolve("listen", network, family, address).await?;
    let listener = TcpListener::bind(addrs.as_slice()).await.map_err(|e| {
        NetError::new("listen", network, e.into())
            .with_local(&Address::with_network(network, address))
    })?;
    tracing::debug!(network, address, "listening on real network");
    Ok(listener)
}

/// Connect over the real network, bounded by `ctx` if given.
pub(crate) async fn dial(
    ctx: Option<&DialContext>,
    network: &str,
    address: &str,
) -> NetResult<TcpStream> {
    let target = Address::with_network(network, address);
    let Some(family) = Family::of(network) else {
        return Err(NetError::new("dial", network, Cause::UnknownNetwork).with_remote(&target));
    };
    let connect = async {
        let addrs = resolve("dial", network, family, address).await?;
        TcpStream::connect(addrs.as_slice())
            .await
            .map_err(|e| NetError::new("dial", network, e.into()).with_remote(&target))
    };
    match ctx {
        None => connect.await,
        Some(ctx) => tokio::select! {
            biased;
            cause = ctx.done() => {
                Err(NetError::new("dial", network, cause.into()).with_remote(&target))
            }
            res = connect => res,
        },
    }
}

/// Listener returned by [`Provider::listen`](crate::Provider::listen).
#[derive(Debug)]
pub enum Listener {
    /// In-memory listener.
    Memory(MemListener),
    /// Real TCP listener, tagged with the network it was bound on.
    Tcp {
        /// Network name as supplied by the caller.
        network: String,
        /// The bound socket.
        listener: TcpListener,
    },
}

impl Listener {
    /// Accept the next connection.
    pub async fn accept(&self) -> NetResult<Conn> {
        match self {
            Listener::Memory(listener) => listener.accept().await.map(Conn::Memory),
            Listener::Tcp { network, listener } => {
                let (stream, _) = listener.accept().await.map_err(|e| {
                    let err = NetError::new("accept", network.as_str(), e.into());
                    match self.addr() {
                        Some(addr) => err.with_local(&addr),
                        None => err,
                    }
                })?;
                Ok(Conn::Tcp {
                    network: network.clone(),
                    stream,
                })
            }
        }
    }

    /// Close the listener, consuming it.
    ///
    /// On return the name (or the TCP port) is free to bind again. Use
    /// [`as_memory`](Listener::as_memory) for an in-memory close that keeps
    /// the handle around.
    pub async fn close(self) -> NetResult<()> {
        match self {
            Listener::Memory(listener) => listener.close().await,
            Listener::Tcp { network, listener } => {
                tracing::debug!(
                    network = %network,
                    addr = ?listener.local_addr().ok(),
                    "real listener closed"
                );
                drop(listener);
                Ok(())
            }
        }
    }

    /// Bound address. `None` if the OS cannot report it.
    pub fn addr(&self) -> Option<Address> {
        match self {
            Listener::Memory(listener) => Some(listener.addr().clone()),
            Listener::Tcp { network, listener } => listener
                .local_addr()
                .ok()
                .map(|addr| describe(network, addr)),
        }
    }

    /// The in-memory listener, if this is one.
    pub fn as_memory(&self) -> Option<&MemListener> {
        match self {
            Listener::Memory(listener) => Some(listener),
            Listener::Tcp { .. } => None,
        }
    }
}

/// Connection returned by [`Provider::dial`](crate::Provider::dial).
#[derive(Debug)]
pub enum Conn {
    /// In-memory connection.
    Memory(Connection),
    /// Real TCP stream, tagged with the network it was dialed on.
    Tcp {
        /// Network name as supplied by the caller.
        network: String,
        /// The connected socket.
        stream: TcpStream,
    },
}

impl Conn {
    /// This endpoint's address.
    pub fn local_addr(&self) -> Option<Address> {
        match self {
            Conn::Memory(conn) => Some(conn.local_addr().clone()),
            Conn::Tcp { network, stream } => {
                stream.local_addr().ok().map(|a| describe(network, a))
            }
        }
    }

    /// The peer's address.
    pub fn remote_addr(&self) -> Option<Address> {
        match self {
            Conn::Memory(conn) => Some(conn.remote_addr().clone()),
            Conn::Tcp { network, stream } => stream.peer_addr().ok().map(|a| describe(network, a)),
        }
    }

    /// The in-memory connection, if this is one.
    pub fn as_memory(&self) -> Option<&Connection> {
        match self {
            Conn::Memory(conn) => Some(conn),
            Conn::Tcp { .. } => None,
        }
    }

    /// Unwrap the in-memory connection.
    pub fn into_memory(self) -> Option<Connection> {
        match self {
            Conn::Memory(conn) => Some(conn),
            Conn::Tcp { .. } => None,
        }
    }
}

impl AsyncRead for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Memory(conn) => Pin::new(conn).poll_read(cx, buf),
            Conn::Tcp { stream, .. } => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Conn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Conn::Memory(conn) => Pin::new(conn).poll_write(cx, buf),
            Conn::Tcp { stream, .. } => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Memory(conn) => Pin::new(conn).poll_flush(cx),
            Conn::Tcp { stream, .. } => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Memory(conn) => Pin::new(conn).poll_shutdown(cx),
            Conn::Tcp { stream, .. } => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
