//! Message processors and their registry.
//!
//! # Responsibilities
//! - Define the contract between a session and whatever handles its requests
//! - Map processor ids to processors, shared across all connections
//!
//! # Design Decisions
//! - `receive` is called on the connection's task and must not block;
//!   processors spawn their own work and answer through the correlator
//! - The body may still be streaming when `receive` is called

pub mod echo;
pub mod forward;

use std::sync::Arc;

use dashmap::DashMap;

use crate::message::HttpMessage;
use crate::session::ResponseCorrelator;

pub use echo::EchoProcessor;
pub use forward::ForwardProcessor;

/// Error type for processor hand-off.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("no async runtime available to process the message")]
    NoRuntime,
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Handles requests for one or more listeners.
pub trait MessageProcessor: Send + Sync {
    /// Take ownership of a message and its reply path.
    fn receive(&self, message: HttpMessage, correlator: ResponseCorrelator) -> Result<(), ProcessorError>;
}

/// Spawn onto the current runtime, or fail the hand-off.
pub(crate) fn spawn<F>(task: F) -> Result<(), ProcessorError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| ProcessorError::NoRuntime)?;
    handle.spawn(task);
    Ok(())
}

/// Processor id → processor.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: Arc<DashMap<String, Arc<dyn MessageProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor, replacing any previous one with the same id.
    pub fn register(&self, id: impl Into<String>, processor: Arc<dyn MessageProcessor>) {
        let id = id.into();
        if self.processors.insert(id.clone(), processor).is_some() {
            tracing::info!(processor = %id, "Replaced message processor");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MessageProcessor>> {
        self.processors.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &str) -> bool {
        self.processors.remove(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.processors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Discard;

    impl MessageProcessor for Discard {
        fn receive(&self, _message: HttpMessage, _correlator: ResponseCorrelator) -> Result<(), ProcessorError> {
            Ok(())
        }
    }

    #[test]
    fn register_get_remove() {
        let registry = ProcessorRegistry::new();
        assert!(registry.get("default").is_none());

        registry.register("default", Arc::new(Discard));
        registry.register("audit", Arc::new(Discard));
        assert!(registry.get("default").is_some());
        assert_eq!(registry.ids(), vec!["audit".to_string(), "default".to_string()]);

        let shared = registry.clone();
        assert!(shared.remove("audit"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn spawn_without_runtime_fails() {
        assert!(matches!(spawn(async {}), Err(ProcessorError::NoRuntime)));
    }
}
