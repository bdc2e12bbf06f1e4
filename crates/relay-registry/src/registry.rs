//! The identity -> live connection map.

use crate::ConnectionHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Registry of live connections, at most one per identity.
///
/// All mutations go through the one lock, which makes `register`'s
/// install-and-evict and `remove`'s id check atomic with respect to each
/// other — the invariant that an identity never has two live handles is
/// enforced here and nowhere else.
#[derive(Clone)]
pub struct ConnectionRegistry {
    entries: Arc<RwLock<HashMap<String, ConnectionHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate a process-unique connection id.
    pub fn next_connection_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Install `handle` as the live connection for its identity.
    ///
    /// Returns the evicted prior handle, if any; the caller is responsible
    /// for closing it (last writer wins, no graceful handoff).
    pub async fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let identity = handle.identity().to_string();
        let previous = self
            .entries
            .write()
            .await
            .insert(identity.clone(), handle);
        if previous.is_some() {
            debug!(identity = %identity, "Replaced existing connection");
        }
        previous
    }

    /// Get the current live connection for an identity, if any.
    pub async fn lookup(&self, identity: &str) -> Option<ConnectionHandle> {
        self.entries.read().await.get(identity).cloned()
    }

    /// Remove the entry for `identity`, but only if it still references the
    /// connection with `connection_id`.
    ///
    /// The id check guards the race between a disconnect and a reconnect:
    /// a stale connection closing late must not remove its replacement.
    /// Returns true when an entry was removed.
    pub async fn remove(&self, identity: &str, connection_id: u64) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(identity) {
            Some(current) if current.id() == connection_id => {
                entries.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Number of identities currently online.
    pub async fn online_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionEvent;
    use tokio::sync::mpsc;

    fn make_handle(
        registry: &ConnectionRegistry,
        identity: &str,
    ) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = ConnectionHandle::new(registry.next_connection_id(), identity, tx);
        (handle, rx)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = make_handle(&registry, "alice");
        let id = handle.id();

        assert!(registry.register(handle).await.is_none());

        let found = registry.lookup("alice").await.unwrap();
        assert_eq!(found.id(), id);
        assert_eq!(found.identity(), "alice");

        assert!(registry.lookup("bob").await.is_none());
        assert_eq!(registry.online_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_register_evicts_first() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = make_handle(&registry, "alice");
        let (second, _rx2) = make_handle(&registry, "alice");
        let first_id = first.id();
        let second_id = second.id();

        registry.register(first).await;
        let evicted = registry.register(second).await.expect("first is evicted");
        assert_eq!(evicted.id(), first_id);

        // The first handle is unreachable through the registry now
        assert_eq!(registry.lookup("alice").await.unwrap().id(), second_id);
        assert_eq!(registry.online_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_requires_matching_connection_id() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = make_handle(&registry, "alice");
        let (second, _rx2) = make_handle(&registry, "alice");
        let first_id = first.id();
        let second_id = second.id();

        registry.register(first).await;
        registry.register(second).await;

        // The stale connection's late disconnect must not remove its
        // replacement.
        assert!(!registry.remove("alice", first_id).await);
        assert!(registry.lookup("alice").await.is_some());

        assert!(registry.remove("alice", second_id).await);
        assert!(registry.lookup("alice").await.is_none());
        assert_eq!(registry.online_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_identity_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.remove("ghost", 1).await);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = ConnectionRegistry::new();
        let a = registry.next_connection_id();
        let b = registry.next_connection_id();
        assert_ne!(a, b);
    }
}
