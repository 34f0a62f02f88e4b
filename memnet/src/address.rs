//! Logical endpoint addressing.
//!
//! An [`Address`] names one end of an in-memory connection. It is the
//! in-process counterpart of an `ip:port` pair: a network tag plus a free-form
//! endpoint name.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Unbuffered in-memory network.
pub const NETWORK_MEMU: &str = "memu";

/// Buffered in-memory network tag.
///
/// Addresses carrying this tag are recognised but rejected by every
/// in-memory operation; only [`NETWORK_MEMU`] has a transport.
pub const NETWORK_MEMB: &str = "memb";

/// Reserved endpoint name used when no endpoint is given.
pub const LOCALHOST: &str = "localhost";

/// Logical endpoint identifier.
///
/// Two addresses are the same endpoint iff their network and name match;
/// the buffering flag is a capability marker and does not take part in
/// equality.
///
/// # Examples
///
/// ```
/// use memnet::Address;
///
/// let addr = Address::new("svcA");
/// assert_eq!(addr.to_string(), "memu:svcA");
/// assert!(!addr.is_buffered());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    network: String,
    name: String,
    #[serde(default)]
    buffered: bool,
}

impl Address {
    /// Create an unbuffered address on the `memu` network.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            network: NETWORK_MEMU.to_string(),
            name: name.into(),
            buffered: false,
        }
    }

    /// Create a buffered address on the `memb` network.
    pub fn buffered(name: impl Into<String>) -> Self {
        Self {
            network: NETWORK_MEMB.to_string(),
            name: name.into(),
            buffered: true,
        }
    }

    /// Create an address tagged with an arbitrary network name.
    ///
    /// Used to describe real-network endpoints, e.g. `tcp:127.0.0.1:80`.
    pub fn with_network(network: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            name: name.into(),
            buffered: false,
        }
    }

    /// The reserved `localhost` endpoint on `memu`.
    pub fn localhost() -> Self {
        Self::new(LOCALHOST)
    }

    /// Network tag of this address.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Endpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the buffered transport variant was requested.
    pub fn is_buffered(&self) -> bool {
        self.buffered
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.network == other.network && self.name == other.name
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.network.hash(state);
        self.name.hash(state);
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.network, self.name)
    }
}
