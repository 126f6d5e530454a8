//! Connection registry for reportq.
//!
//! A delivery task only carries the connection identifier of the queued
//! transport that created it. When the queue runs the task, the identifier is
//! resolved here to the transport that performs the actual send.
//!
//! The registry is process-wide: every [`QueuedTransport`] registers its
//! wrapped transport on construction and removes it on close.
//!
//! [`QueuedTransport`]: crate::transport::QueuedTransport

use crate::transport::SharedTransport;
use crate::utils::redact_credentials;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Maps connection identifiers to the transports they deliver through.
pub struct ConnectionRegistry {
    /// Registered transports by connection identifier
    connections: RwLock<HashMap<String, SharedTransport>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        tracing::debug!("Creating new connection registry");
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a transport under a connection identifier.
    ///
    /// A transport already registered under the same identifier is replaced
    /// and returned.
    pub fn register(
        &self,
        connection_id: &str,
        transport: SharedTransport,
    ) -> Option<SharedTransport> {
        let previous = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id.to_string(), transport);

        if previous.is_some() {
            tracing::warn!(
                "Connection '{}' was already registered, replacing it",
                redact_credentials(connection_id)
            );
        } else {
            tracing::debug!("Registered connection: {}", redact_credentials(connection_id));
        }

        previous
    }

    /// Get the transport registered under a connection identifier.
    pub fn get(&self, connection_id: &str) -> Option<SharedTransport> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    /// Remove the entry for `connection_id` if it still points at `transport`.
    ///
    /// Returns whether an entry was removed.
    pub fn unregister(&self, connection_id: &str, transport: &SharedTransport) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match connections.get(connection_id) {
            Some(current) if Arc::ptr_eq(current, transport) => {
                connections.remove(connection_id);
                tracing::debug!("Unregistered connection: {}", redact_credentials(connection_id));
                true
            }
            Some(_) => {
                tracing::debug!(
                    "Connection '{}' was re-registered by another transport, keeping it",
                    redact_credentials(connection_id)
                );
                false
            }
            None => false,
        }
    }

    /// Remove whatever is registered under `connection_id`.
    pub fn remove(&self, connection_id: &str) -> Option<SharedTransport> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
    }

    /// Check if a connection identifier is registered.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(connection_id)
    }

    /// All registered connection identifiers, sorted.
    pub fn connection_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connection_ids())
            .finish()
    }
}

/// Global singleton registry instance.
static CONNECTION_REGISTRY: OnceLock<Arc<ConnectionRegistry>> = OnceLock::new();

/// Get the global connection registry.
///
/// The registry is initialized on first access.
pub fn connection_registry() -> Arc<ConnectionRegistry> {
    Arc::clone(CONNECTION_REGISTRY.get_or_init(|| {
        tracing::debug!("Initializing global connection registry");
        Arc::new(ConnectionRegistry::new())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTransport;

    fn transport() -> SharedTransport {
        Arc::new(RecordingTransport::new())
    }

    #[test]
    fn test_register_and_get() {
        let registry = ConnectionRegistry::new();
        let transport = transport();

        assert!(registry.register("conn-a", Arc::clone(&transport)).is_none());
        assert!(registry.contains("conn-a"));
        assert!(Arc::ptr_eq(&registry.get("conn-a").unwrap(), &transport));
        assert!(registry.get("conn-b").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_replaces_existing() {
        let registry = ConnectionRegistry::new();
        let first = transport();
        let second = transport();

        registry.register("conn", Arc::clone(&first));
        let previous = registry.register("conn", Arc::clone(&second)).unwrap();

        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(&registry.get("conn").unwrap(), &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_checks_identity() {
        let registry = ConnectionRegistry::new();
        let first = transport();
        let second = transport();

        registry.register("conn", Arc::clone(&first));
        registry.register("conn", Arc::clone(&second));

        // The replaced transport must not evict its successor
        assert!(!registry.unregister("conn", &first));
        assert!(registry.contains("conn"));

        assert!(registry.unregister("conn", &second));
        assert!(registry.is_empty());
        assert!(!registry.unregister("conn", &second));
    }

    #[test]
    fn test_remove_and_ids() {
        let registry = ConnectionRegistry::new();
        registry.register("b", transport());
        registry.register("a", transport());

        assert_eq!(registry.connection_ids(), vec!["a", "b"]);
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.connection_ids(), vec!["b"]);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let registry = connection_registry();
        assert!(Arc::ptr_eq(&registry, &connection_registry()));
    }
}
