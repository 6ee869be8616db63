//! Startup orchestration.
//!
//! Builds the session context from validated configuration: the configured
//! processor is registered under its id, and the rate-limit gate and
//! WebSocket handler are installed when enabled.

use std::sync::Arc;

use crate::config::{ProcessorKind, ServerConfig};
use crate::dispatch::TracingHooks;
use crate::http::WebSocketEcho;
use crate::net::ConnectionRegistry;
use crate::processor::{EchoProcessor, ForwardProcessor, MessageProcessor, ProcessorRegistry};
use crate::security::RateLimitGate;
use crate::session::SessionContext;
use crate::upgrade::UpgradeNegotiator;

/// Registry with the configured processor.
pub fn build_processors(config: &ServerConfig) -> ProcessorRegistry {
    let processor: Arc<dyn MessageProcessor> = match config.processor.kind {
        ProcessorKind::Echo => Arc::new(EchoProcessor::new()),
        ProcessorKind::Forward => Arc::new(ForwardProcessor::new(&config.backends, &config.timeouts)),
    };

    let registry = ProcessorRegistry::new();
    registry.register(config.processor.id.clone(), processor);
    tracing::info!(
        processor = %config.processor.id,
        kind = ?config.processor.kind,
        "Message processor registered"
    );
    registry
}

/// Session context for the configured listener.
pub fn build_context(
    config: &ServerConfig,
    processors: ProcessorRegistry,
    connections: ConnectionRegistry,
) -> SessionContext {
    let negotiator = UpgradeNegotiator::from_config(&config.listener, &config.websocket);
    let mut context = SessionContext::new(config.listener.clone(), processors, connections)
        .with_negotiator(negotiator)
        .with_hooks(Arc::new(TracingHooks));

    if config.rate_limit.enabled {
        tracing::info!(
            rps = config.rate_limit.requests_per_second,
            burst = config.rate_limit.burst_size,
            "Rate limiting enabled"
        );
        context = context.with_gate(Arc::new(RateLimitGate::new(&config.rate_limit)));
    }
    if config.websocket.enabled {
        context = context.with_upgrade_handler(Arc::new(WebSocketEcho::new()));
    }
    context
}
