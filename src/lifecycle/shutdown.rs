//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::net::ConnectionRegistry;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait for open connections to close, up to `deadline`.
    ///
    /// Returns true if every connection finished in time.
    pub async fn drain(&self, connections: &ConnectionRegistry, deadline: Duration) -> bool {
        let remaining = connections.active_count();
        if remaining == 0 {
            return true;
        }
        tracing::info!(connections = remaining, deadline = ?deadline, "Waiting for connections to drain");

        match tokio::time::timeout(deadline, connections.wait_for_idle()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    connections = connections.active_count(),
                    "Drain deadline reached with connections still open"
                );
                false
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ConnectionId, ConnectionInfo};

    #[tokio::test]
    async fn trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);

        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn drain_times_out_with_open_connections() {
        let shutdown = Shutdown::new();
        let connections = ConnectionRegistry::new();
        assert!(shutdown.drain(&connections, Duration::from_millis(10)).await);

        let id = ConnectionId::new();
        connections.register(ConnectionInfo::new(id, "default"));
        assert!(!shutdown.drain(&connections, Duration::from_millis(150)).await);

        connections.notify_connection_closed(id);
        assert!(shutdown.drain(&connections, Duration::from_millis(10)).await);
    }
}
