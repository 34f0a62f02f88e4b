//! Network-name aliasing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Maps caller-supplied network names to canonical ones.
///
/// `set_alias("tcp", "memu")` makes a later `dial("tcp", ..)` run on the
/// in-memory network. A missing entry means no translation.
#[derive(Debug, Default)]
pub struct NetworkAliasTable {
    aliases: RwLock<HashMap<String, String>>,
}

impl NetworkAliasTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `from` to `to`. An empty `to` removes the mapping for `from`.
    pub fn set_alias(&self, from: &str, to: &str) {
        let mut aliases = self
            .aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if to.is_empty() {
            aliases.remove(from);
        } else {
            aliases.insert(from.to_string(), to.to_string());
        }
    }

    /// Canonical name for `network`, or `network` itself when unmapped.
    pub fn resolve(&self, network: &str) -> String {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(network)
            .cloned()
            .unwrap_or_else(|| network.to_string())
    }
}
