//! Connection identity and the process-wide connection registry.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track open inbound connections across all listeners
//! - Receive close notifications from sessions
//! - Let shutdown wait for connections to drain

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the registry knows about one open connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub listener_id: String,
    pub peer_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
    /// Seconds since the Unix epoch.
    pub opened_at: u64,
}

impl ConnectionInfo {
    pub fn new(id: ConnectionId, listener_id: impl Into<String>) -> Self {
        let opened_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id,
            listener_id: listener_id.into(),
            peer_addr: None,
            local_addr: None,
            opened_at,
        }
    }

    pub fn with_addrs(mut self, peer: Option<SocketAddr>, local: Option<SocketAddr>) -> Self {
        self.peer_addr = peer;
        self.local_addr = local;
        self
    }
}

/// Process-wide registry of inbound connections.
///
/// Cheap to clone; all clones share state. Safe for concurrent mutation from
/// any number of connection tasks.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    opened_total: AtomicU64,
    closed_total: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened connection.
    pub fn register(&self, info: ConnectionInfo) {
        self.inner.opened_total.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %info.id, "Connection registered");
        self.inner.connections.insert(info.id, info);
    }

    /// Called by a session once its teardown has finished.
    ///
    /// Returns false if the connection was not (or no longer) registered.
    pub fn notify_connection_closed(&self, id: ConnectionId) -> bool {
        self.inner.closed_total.fetch_add(1, Ordering::SeqCst);
        let known = self.inner.connections.remove(&id).is_some();
        if !known {
            tracing::warn!(connection_id = %id, "Close notification for unknown connection");
        }
        known
    }

    /// Current count of open connections.
    pub fn active_count(&self) -> u64 {
        self.inner.connections.len() as u64
    }

    pub fn opened_total(&self) -> u64 {
        self.inner.opened_total.load(Ordering::SeqCst)
    }

    /// Number of close notifications received.
    pub fn closed_total(&self) -> u64 {
        self.inner.closed_total.load(Ordering::SeqCst)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.connections.contains_key(&id)
    }

    /// Copy of every open connection, ordered by id.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut all: Vec<_> = self
            .inner
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|info| info.id);
        all
    }

    /// Wait until no connections remain open.
    pub async fn wait_for_idle(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn registry_counts() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.active_count(), 0);

        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.register(ConnectionInfo::new(a, "default"));
        registry.register(ConnectionInfo::new(b, "default"));
        assert_eq!(registry.active_count(), 2);

        assert!(registry.notify_connection_closed(a));
        assert_eq!(registry.active_count(), 1);
        assert!(!registry.contains(a));

        // A repeated notification is counted but does not corrupt accounting.
        assert!(!registry.notify_connection_closed(a));
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.opened_total(), 2);
        assert_eq!(registry.closed_total(), 2);
    }

    #[test]
    fn concurrent_register_and_close() {
        let registry = ConnectionRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        let id = ConnectionId::new();
                        registry.register(ConnectionInfo::new(id, "default"));
                        registry.notify_connection_closed(id);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.opened_total(), 2000);
        assert_eq!(registry.closed_total(), 2000);
    }
}
