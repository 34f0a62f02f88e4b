//! Provider façade.
//!
//! A [`Provider`] owns one [`ListenerRegistry`] per in-memory network and a
//! [`NetworkAliasTable`]. Operations resolve the network alias first, then
//! dispatch either to the in-memory path or, for unrecognised networks, to
//! the real network.
//!
//! Providers are independent: two providers never see each other's
//! listeners. Clones share state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::instrument;

use crate::address::{Address, LOCALHOST, NETWORK_MEMU};
use crate::alias::NetworkAliasTable;
use crate::cancel::DialContext;
use crate::config::ProviderConfig;
use crate::connection::Connection;
use crate::error::{AddrRole, Cause, NetError, NetResult};
use crate::fallback::{self, Conn, Listener};
use crate::listener::{ListenerShared, MemListener};
use crate::network::MemNetworkProvider;
use crate::registry::ListenerRegistry;

/// Entry point for listening and dialing.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), memnet::NetError> {
/// use memnet::Provider;
///
/// let provider = Provider::new();
/// let listener = provider.listen("memu", "svcA").await?;
/// let mut client = provider.dial("memu", "svcA").await?;
/// let mut server = listener.accept().await?;
///
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
/// client.write_all(b"ping").await.expect("write");
/// let mut buf = [0u8; 4];
/// server.read_exact(&mut buf).await.expect("read");
/// assert_eq!(&buf, b"ping");
///
/// listener.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

#[derive(Debug, Default)]
struct ProviderInner {
    config: ProviderConfig,
    memu: ListenerRegistry,
    aliases: NetworkAliasTable,
    next_ephemeral: AtomicU64,
}

impl Provider {
    /// Create a provider with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with an explicit configuration.
    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                config,
                ..ProviderInner::default()
            }),
        }
    }

    /// The provider's configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.inner.config
    }

    /// Translate `from` to `to` for every later operation. An empty `to`
    /// removes the translation.
    pub fn map_network(&self, from: &str, to: &str) {
        tracing::debug!(from, to, "network alias updated");
        self.inner.aliases.set_alias(from, to);
    }

    /// Canonical name `network` currently resolves to.
    pub fn resolve_network(&self, network: &str) -> String {
        self.inner.aliases.resolve(network)
    }

    /// Registry for a canonical in-memory network name.
    pub fn registry(&self, canonical: &str) -> Option<&ListenerRegistry> {
        match canonical {
            NETWORK_MEMU => Some(&self.inner.memu),
            _ => None,
        }
    }

    /// A [`NetworkProvider`](crate::NetworkProvider) bound to `network`.
    pub fn network_provider(&self, network: &str) -> MemNetworkProvider {
        MemNetworkProvider::new(self.clone(), network)
    }

    /// Listen on `address` of `network`.
    ///
    /// An empty address means `localhost`. Networks that are not in-memory
    /// go to the real network.
    #[instrument(skip(self))]
    pub async fn listen(&self, network: &str, address: &str) -> NetResult<Listener> {
        let canonical = self.resolve_network(network);
        if self.registry(&canonical).is_some() {
            let local = (!address.is_empty()).then(|| Address::new(address));
            return self.listen_mem(network, local).await.map(Listener::Memory);
        }
        let listener = self.fallback_listen(network, address).await?;
        Ok(Listener::Tcp {
            network: network.to_string(),
            listener,
        })
    }

    /// Listen on an explicit in-memory address; `None` means `localhost`.
    #[instrument(skip(self))]
    pub async fn listen_mem(&self, network: &str, local: Option<Address>) -> NetResult<MemListener> {
        let local = local.unwrap_or_else(Address::localhost);
        let canonical = self.resolve_network(network);
        let Some(registry) = self.registry(&canonical) else {
            return Err(NetError::new("listen", network, Cause::UnknownNetwork)
                .with_endpoints(&local, &local));
        };
        if local.is_buffered() {
            return Err(
                NetError::new("listen", network, Cause::IncompatibleAddress(AddrRole::Local))
                    .with_endpoints(&local, &local),
            );
        }

        let shared = ListenerShared::start(local.clone(), self.inner.config.pipe_buffer_size);
        if let Err(cause) = registry.insert(Arc::clone(&shared)).await {
            // Never registered: nothing will fire `removed`, so tear down by hand.
            shared.done.fire();
            shared.removed.fire();
            return Err(NetError::new("listen", network, cause).with_endpoints(&local, &local));
        }
        tracing::debug!(%local, "listening");
        Ok(MemListener::new(shared))
    }

    /// Dial `address` on `network`, waiting at the rendezvous as long as it
    /// takes.
    pub async fn dial(&self, network: &str, address: &str) -> NetResult<Conn> {
        self.dial_inner(None, network, address).await
    }

    /// Dial bounded by `ctx`.
    pub async fn dial_context(
        &self,
        ctx: &DialContext,
        network: &str,
        address: &str,
    ) -> NetResult<Conn> {
        self.dial_inner(Some(ctx), network, address).await
    }

    #[instrument(skip(self, ctx))]
    async fn dial_inner(
        &self,
        ctx: Option<&DialContext>,
        network: &str,
        address: &str,
    ) -> NetResult<Conn> {
        let canonical = self.resolve_network(network);
        if self.registry(&canonical).is_some() {
            let remote = (!address.is_empty()).then(|| Address::new(address));
            return self
                .dial_mem_context(ctx, network, None, remote)
                .await
                .map(Conn::Memory);
        }
        let stream = self.fallback_dial(ctx, network, address).await?;
        Ok(Conn::Tcp {
            network: network.to_string(),
            stream,
        })
    }

    /// Dial with explicit in-memory addresses.
    ///
    /// `None` local gets an ephemeral name (not necessarily unique);
    /// `None` remote means `localhost`.
    pub async fn dial_mem(
        &self,
        network: &str,
        local: Option<Address>,
        remote: Option<Address>,
    ) -> NetResult<Connection> {
        self.dial_mem_context(None, network, local, remote).await
    }

    /// [`dial_mem`](Provider::dial_mem) bounded by an optional context.
    #[instrument(skip(self, ctx))]
    pub async fn dial_mem_context(
        &self,
        ctx: Option<&DialContext>,
        network: &str,
        local: Option<Address>,
        remote: Option<Address>,
    ) -> NetResult<Connection> {
        let local = local.unwrap_or_else(|| self.ephemeral_address());
        let remote = remote.unwrap_or_else(|| Address::new(LOCALHOST));
        let canonical = self.resolve_network(network);
        let Some(registry) = self.registry(&canonical) else {
            return Err(NetError::new("dial", network, Cause::UnknownNetwork)
                .with_endpoints(&local, &remote));
        };

        for (addr, role) in [(&local, AddrRole::Local), (&remote, AddrRole::Remote)] {
            if addr.is_buffered() {
                return Err(NetError::new("dial", network, Cause::IncompatibleAddress(role))
                    .with_endpoints(&local, &remote));
            }
        }

        let listener = registry.lookup(remote.name()).await.map_err(|cause| {
            NetError::new("dial", network, cause).with_endpoints(&local, &remote)
        })?;
        listener.dial(ctx, network, local, remote).await
    }

    fn ephemeral_address(&self) -> Address {
        let n = self.inner.next_ephemeral.fetch_add(1, Ordering::Relaxed) + 1;
        Address::new(n.to_string())
    }

    async fn fallback_listen(
        &self,
        network: &str,
        address: &str,
    ) -> NetResult<tokio::net::TcpListener> {
        if !self.inner.config.fallback_enabled {
            return Err(NetError::new("listen", network, Cause::UnknownNetwork)
                .with_local(&Address::with_network(network, address)));
        }
        fallback::listen(network, address).await
    }

    async fn fallback_dial(
        &self,
        ctx: Option<&DialContext>,
        network: &str,
        address: &str,
    ) -> NetResult<tokio::net::TcpStream> {
        if !self.inner.config.fallback_enabled {
            return Err(NetError::new("dial", network, Cause::UnknownNetwork)
                .with_remote(&Address::with_network(network, address)));
        }
        fallback::dial(ctx, network, address).await
    }
}
