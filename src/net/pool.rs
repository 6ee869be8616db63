//! Per-connection registry of downstream pools.
//!
//! # Responsibilities
//! - Hold the pools a processor opened on behalf of one inbound connection
//! - Close every pool exactly once when the connection terminates
//!
//! # Design Decisions
//! - Owned by a single session, never shared, never locked
//! - Entries are removed as they are closed, so a second drain is a no-op
//! - One failing pool does not stop the remaining pools from closing

use std::collections::BTreeMap;
use std::fmt;

/// Error type for downstream pool teardown.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to close downstream pool: {0}")]
    Close(String),
}

/// A pool of connections to one downstream destination.
pub trait DownstreamPool: Send + fmt::Debug {
    /// Close the pool and every connection it holds.
    fn close(&mut self) -> Result<(), PoolError>;
}

/// Outcome of draining a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub closed: usize,
    pub failed: usize,
}

/// Destination key → pool, owned by one session.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    entries: BTreeMap<String, Box<dyn DownstreamPool>>,
    drained: bool,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under `key`.
    ///
    /// The pool is handed back if the key is taken or the registry has already
    /// been drained; the caller is then responsible for closing it.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        pool: Box<dyn DownstreamPool>,
    ) -> Result<(), Box<dyn DownstreamPool>> {
        let key = key.into();
        if self.drained || self.entries.contains_key(&key) {
            return Err(pool);
        }
        self.entries.insert(key, pool);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Close and remove every entry.
    pub fn drain(&mut self) -> DrainReport {
        self.drained = true;
        let mut report = DrainReport::default();
        for (key, mut pool) in std::mem::take(&mut self.entries) {
            match pool.close() {
                Ok(()) => report.closed += 1,
                Err(e) => {
                    tracing::error!(pool = %key, error = %e, "Couldn't close downstream pool");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct CountingPool {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl DownstreamPool for CountingPool {
        fn close(&mut self) -> Result<(), PoolError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PoolError::Close("socket stuck".into()))
            } else {
                Ok(())
            }
        }
    }

    fn pool(closes: &Arc<AtomicUsize>, fail: bool) -> Box<dyn DownstreamPool> {
        Box::new(CountingPool {
            closes: closes.clone(),
            fail,
        })
    }

    #[test]
    fn drain_closes_each_entry_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = PoolRegistry::new();
        registry.insert("backendA", pool(&closes, false)).unwrap();
        registry.insert("backendB", pool(&closes, false)).unwrap();

        assert_eq!(registry.drain(), DrainReport { closed: 2, failed: 0 });
        assert_eq!(registry.drain(), DrainReport::default());
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_entry_does_not_abandon_others() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = PoolRegistry::new();
        registry.insert("a", pool(&closes, true)).unwrap();
        registry.insert("b", pool(&closes, false)).unwrap();
        registry.insert("c", pool(&closes, true)).unwrap();

        let report = registry.drain();
        assert_eq!(report, DrainReport { closed: 1, failed: 2 });
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn insert_rejects_duplicates_and_late_entries() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = PoolRegistry::new();
        registry.insert("a", pool(&closes, false)).unwrap();
        assert!(registry.insert("a", pool(&closes, false)).is_err());

        registry.drain();
        let mut late = registry
            .insert("b", pool(&closes, false))
            .expect_err("drained registry must refuse entries");
        late.close().unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
