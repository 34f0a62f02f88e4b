//! # memnet
//!
//! In-memory, socket-shaped connections for tests and in-process simulation.
//!
//! Components listen on logical endpoint names such as `"svcA"` and dial
//! each other by name, exchanging bytes over duplex pipes. Nothing touches
//! the operating system's network stack unless a network name is not
//! recognised, in which case the request falls through to real TCP.
//!
//! ## Networks
//!
//! - `memu`: unbuffered in-memory network. Every dial is a rendezvous with
//!   an accept on the target listener.
//! - `memb`: buffered tag; addresses carrying it are rejected with
//!   [`ErrorKind::IncompatibleAddress`].
//! - anything else: handed to the real network (`tcp`, `tcp4`, `tcp6`),
//!   unless [`ProviderConfig::isolated`] disabled that.
//!
//! [`Provider::map_network`] aliases one network name to another, so code
//! that dials `"tcp"` can be redirected onto `memu` without changes.
//!
//! ## Components
//!
//! - [`Provider`]: listen, dial, and alias façade
//! - [`ListenerRegistry`]: live listeners of one network, by name
//! - [`MemListener`]: rendezvous slot and close cascade
//! - [`Connection`]: one end of a duplex pipe with addressing and deadlines
//! - [`NetError`]: structured error with a programmatic [`ErrorKind`]
//! - [`NetworkProvider`]: trait that lets code run on memory or TCP alike

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod address;
mod alias;
mod cancel;
mod config;
mod connection;
mod error;
mod fallback;
mod listener;
mod network;
mod provider;
mod registry;
mod signal;

// Addressing
pub use address::{Address, LOCALHOST, NETWORK_MEMB, NETWORK_MEMU};
pub use alias::NetworkAliasTable;

// Cancellation and configuration
pub use cancel::{CancelCause, CancelToken, DialContext};
pub use config::{ProviderConfig, DEFAULT_PIPE_BUFFER_SIZE};

// Errors
pub use error::{AddrRole, Cause, ErrorKind, NetError, NetResult};

// Transport
pub use connection::{Connection, Side};
pub use fallback::{Conn, Listener};
pub use listener::MemListener;
pub use provider::Provider;
pub use registry::ListenerRegistry;

// Provider traits
pub use network::{
    MemNetworkProvider, NetworkListener, NetworkProvider, TokioNetworkProvider, TokioTcpListener,
};
