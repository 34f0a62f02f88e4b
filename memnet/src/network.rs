//! Network provider abstraction for in-memory and real networking.
//!
//! Code written against [`NetworkProvider`] runs unchanged on real TCP
//! ([`TokioNetworkProvider`]) or on an in-memory network
//! ([`MemNetworkProvider`]).

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::address::Address;
use crate::connection::Connection;
use crate::fallback;
use crate::listener::MemListener;
use crate::provider::Provider;

/// Provider trait for creating connections and listeners.
///
/// Clone allows sharing providers across tasks cheaply.
#[async_trait]
pub trait NetworkProvider: Clone + Send + Sync {
    /// The stream type for this provider.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// The listener type for this provider.
    type Listener: NetworkListener<Stream = Self::Stream> + 'static;

    /// Create a listener bound to the given address.
    async fn bind(&self, addr: &str) -> io::Result<Self::Listener>;

    /// Connect to a remote address.
    async fn connect(&self, addr: &str) -> io::Result<Self::Stream>;
}

/// Trait for listeners that can accept connections.
#[async_trait]
pub trait NetworkListener: Send + Sync {
    /// The stream type that this listener produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Accept a single incoming connection, with the peer's address.
    async fn accept(&self) -> io::Result<(Self::Stream, Address)>;

    /// Get the local address this listener is bound to.
    fn local_addr(&self) -> io::Result<Address>;
}

/// Real TCP through the fallback path.
///
/// Addresses are `host:port` strings; the network name picks the address
/// family (`tcp`, `tcp4` or `tcp6`).
#[derive(Debug, Clone)]
pub struct TokioNetworkProvider {
    network: String,
}

impl TokioNetworkProvider {
    /// Provider on `tcp` (any address family).
    pub fn new() -> Self {
        Self::with_network("tcp")
    }

    /// Provider restricted to one TCP network name.
    pub fn with_network(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
        }
    }
}

impl Default for TokioNetworkProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkProvider for TokioNetworkProvider {
    type Stream = tokio::net::TcpStream;
    type Listener = TokioTcpListener;

    async fn bind(&self, addr: &str) -> io::Result<Self::Listener> {
        let inner = fallback::listen(&self.network, addr).await?;
        Ok(TokioTcpListener {
            network: self.network.clone(),
            inner,
        })
    }

    async fn connect(&self, addr: &str) -> io::Result<Self::Stream> {
        Ok(fallback::dial(None, &self.network, addr).await?)
    }
}

/// Bound TCP socket that reports peers as network-tagged [`Address`]es.
#[derive(Debug)]
pub struct TokioTcpListener {
    network: String,
    inner: tokio::net::TcpListener,
}

#[async_trait]
impl NetworkListener for TokioTcpListener {
    type Stream = tokio::net::TcpStream;

    async fn accept(&self) -> io::Result<(Self::Stream, Address)> {
        let (stream, peer) = self.inner.accept().await?;
        Ok((stream, fallback::describe(&self.network, peer)))
    }

    fn local_addr(&self) -> io::Result<Address> {
        Ok(fallback::describe(&self.network, self.inner.local_addr()?))
    }
}

/// In-memory networking on one network of a [`Provider`].
///
/// Obtained from [`Provider::network_provider`]. Addresses are endpoint
/// names, e.g. `"svcA"`.
#[derive(Debug, Clone)]
pub struct MemNetworkProvider {
    provider: Provider,
    network: String,
}

impl MemNetworkProvider {
    pub(crate) fn new(provider: Provider, network: impl Into<String>) -> Self {
        Self {
            provider,
            network: network.into(),
        }
    }

    /// Network name used for every bind and connect.
    pub fn network(&self) -> &str {
        &self.network
    }
}

#[async_trait]
impl NetworkProvider for MemNetworkProvider {
    type Stream = Connection;
    type Listener = MemListener;

    async fn bind(&self, addr: &str) -> io::Result<Self::Listener> {
        Ok(self
            .provider
            .listen_mem(&self.network, Some(Address::new(addr)))
            .await?)
    }

    async fn connect(&self, addr: &str) -> io::Result<Self::Stream> {
        Ok(self
            .provider
            .dial_mem(&self.network, None, Some(Address::new(addr)))
            .await?)
    }
}

#[async_trait]
impl NetworkListener for MemListener {
    type Stream = Connection;

    async fn accept(&self) -> io::Result<(Self::Stream, Address)> {
        let conn = MemListener::accept(self).await?;
        let peer = conn.remote_addr().clone();
        Ok((conn, peer))
    }

    fn local_addr(&self) -> io::Result<Address> {
        Ok(self.addr().clone())
    }
}
