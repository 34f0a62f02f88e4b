//! Name → listener mapping for one in-memory network.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Cause;
use crate::listener::ListenerShared;

/// Concurrency-safe registry of live listeners, keyed by endpoint name.
///
/// At most one live listener exists per name. Entries are only ever removed
/// by the per-listener removal task, after the listener's close signal has
/// fired. Lookups take the read lock, so concurrent dials do not serialize
/// against each other.
#[derive(Debug, Default, Clone)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<HashMap<String, Arc<ListenerShared>>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under its address name and start its removal task.
    ///
    /// Fails with [`Cause::AddressUnavailable`] if the name is taken.
    pub(crate) async fn insert(&self, listener: Arc<ListenerShared>) -> Result<(), Cause> {
        let name = listener.addr().name().to_string();
        {
            let mut listeners = self.listeners.write().await;
            if listeners.contains_key(&name) {
                return Err(Cause::AddressUnavailable);
            }
            listeners.insert(name.clone(), Arc::clone(&listener));
        }
        tracing::debug!(listener = %listener.addr(), "listener registered");

        let removal = tokio::spawn({
            let listeners = Arc::clone(&self.listeners);
            let listener = Arc::clone(&listener);
            async move {
                listener.done.wait().await;
                {
                    let mut listeners = listeners.write().await;
                    if listeners
                        .get(&name)
                        .is_some_and(|current| Arc::ptr_eq(current, &listener))
                    {
                        listeners.remove(&name);
                    }
                }
                tracing::debug!(listener = %listener.addr(), "listener removed");
                listener.removed.fire();
            }
        });
        listener.supervise(removal);
        Ok(())
    }

    /// Find the live listener bound to `name`.
    ///
    /// Fails with [`Cause::UnknownAddress`] if none is bound.
    pub(crate) async fn lookup(&self, name: &str) -> Result<Arc<ListenerShared>, Cause> {
        self.listeners
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or(Cause::UnknownAddress)
    }

    /// Whether a listener is currently registered under `name`.
    pub async fn contains(&self, name: &str) -> bool {
        self.listeners.read().await.contains_key(name)
    }

    /// Number of registered listeners.
    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Whether no listener is registered.
    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }

    /// Names of all registered listeners, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
