//! Connection pool: tracks admitted connections by id and by identity.

use std::sync::Arc;

use dashmap::DashMap;

use relay_core::types::id::{ConnectionId, IdentityId};

use super::handle::ConnectionHandle;

/// Thread-safe pool of admitted connections.
///
/// Reads are lock-free; mutations are serialized by the admission controller.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// Identity → its connections, oldest first.
    by_identity: DashMap<IdentityId, Vec<Arc<ConnectionHandle>>>,
    /// Connection ID → connection handle for direct lookup.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Creates a new empty connection pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the pool.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.by_id.insert(handle.id, handle.clone());
        self.by_identity
            .entry(handle.identity.id.clone())
            .or_default()
            .push(handle);
    }

    /// Removes a connection from the pool.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;
        let identity_id = handle.identity.id.clone();
        if let Some(mut connections) = self.by_identity.get_mut(&identity_id) {
            connections.retain(|c| c.id != *conn_id);
            if connections.is_empty() {
                drop(connections);
                self.by_identity.remove(&identity_id);
            }
        }
        Some(handle)
    }

    /// Gets a specific connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Gets all connections of an identity, oldest first.
    pub fn identity_connections(&self, identity_id: &IdentityId) -> Vec<Arc<ConnectionHandle>> {
        self.by_identity
            .get(identity_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Returns total number of admitted connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Returns number of distinct connected identities.
    pub fn identity_count(&self) -> usize {
        self.by_identity.len()
    }

    /// Returns all connection handles.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use relay_core::types::identity::Identity;

    use super::*;
    use crate::connection::handle::Transport;

    fn handle(id: u64) -> Arc<ConnectionHandle> {
        let (transport, _rx) = Transport::new(4);
        let identity = Identity {
            id: IdentityId::from(id),
            role: "member".into(),
            permissions: vec![],
            display_name: String::new(),
            email: None,
        };
        Arc::new(ConnectionHandle::new_at(identity, transport, Utc::now()))
    }

    #[test]
    fn test_indexes_stay_in_step() {
        let pool = ConnectionPool::new();
        let a = handle(1);
        let b = handle(1);
        let c = handle(2);
        pool.add(a.clone());
        pool.add(b.clone());
        pool.add(c.clone());

        assert_eq!(pool.connection_count(), 3);
        assert_eq!(pool.identity_count(), 2);
        assert_eq!(pool.identity_connections(&IdentityId::from(1u64)).len(), 2);

        pool.remove(&a.id);
        assert_eq!(pool.identity_connections(&IdentityId::from(1u64))[0].id, b.id);

        pool.remove(&b.id);
        assert!(pool.get(&b.id).is_none());
        assert!(pool.identity_connections(&IdentityId::from(1u64)).is_empty());
        assert_eq!(pool.identity_count(), 1);
    }
}
