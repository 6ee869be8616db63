//! Shared collaborators injected into every session.

use std::sync::Arc;

use crate::config::ListenerConfig;
use crate::dispatch::{ConnectionHooks, DispatchGate, NoopHooks};
use crate::net::ConnectionRegistry;
use crate::processor::ProcessorRegistry;
use crate::upgrade::{UpgradeHandler, UpgradeNegotiator};

/// Everything a session needs besides its channel.
///
/// Built once per listener and shared by all of its connections.
pub struct SessionContext {
    listener: ListenerConfig,
    processors: ProcessorRegistry,
    connections: ConnectionRegistry,
    hooks: Arc<dyn ConnectionHooks>,
    gate: Option<Arc<dyn DispatchGate>>,
    upgrades: Option<Arc<dyn UpgradeHandler>>,
    negotiator: UpgradeNegotiator,
}

impl SessionContext {
    pub fn new(
        listener: ListenerConfig,
        processors: ProcessorRegistry,
        connections: ConnectionRegistry,
    ) -> Self {
        let negotiator = UpgradeNegotiator::new(&listener);
        Self {
            listener,
            processors,
            connections,
            hooks: Arc::new(NoopHooks),
            gate: None,
            upgrades: None,
            negotiator,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ConnectionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn DispatchGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_upgrade_handler(mut self, handler: Arc<dyn UpgradeHandler>) -> Self {
        self.upgrades = Some(handler);
        self
    }

    pub fn with_negotiator(mut self, negotiator: UpgradeNegotiator) -> Self {
        self.negotiator = negotiator;
        self
    }

    pub fn listener(&self) -> &ListenerConfig {
        &self.listener
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn hooks(&self) -> &dyn ConnectionHooks {
        self.hooks.as_ref()
    }

    pub fn gate(&self) -> Option<&Arc<dyn DispatchGate>> {
        self.gate.as_ref()
    }

    pub fn upgrade_handler(&self) -> Option<&Arc<dyn UpgradeHandler>> {
        self.upgrades.as_ref()
    }

    pub fn negotiator(&self) -> &UpgradeNegotiator {
        &self.negotiator
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("listener", &self.listener.id)
            .field("processors", &self.processors)
            .field("gate", &self.gate.is_some())
            .field("upgrades", &self.upgrades.is_some())
            .finish()
    }
}
