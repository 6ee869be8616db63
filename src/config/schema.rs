//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the transport.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the inbound transport.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, TLS material, processor).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Processor wired to the listener.
    pub processor: ProcessorConfig,

    /// Backends for the forwarding processor.
    pub backends: Vec<BackendConfig>,

    /// WebSocket upgrade settings.
    pub websocket: WebSocketConfig,

    /// Rate limiting (dispatch gate) configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Listener identity, attached to every message.
    pub id: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// TLS material. Termination happens in front of this listener;
    /// its presence marks connections as secured.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Id of the processor that receives this listener's messages.
    pub message_processor_id: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
            message_processor_id: "default".to_string(),
        }
    }
}

impl ListenerConfig {
    /// True iff the listener carries TLS material.
    pub fn is_secured(&self) -> bool {
        self.tls.is_some()
    }
}

/// TLS material for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Downstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Downstream request timeout in seconds.
    pub request_secs: u64,

    /// Inbound idle timeout in seconds (0 disables).
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Which built-in processor to register.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Reply with the request body.
    Echo,
    /// Reverse-proxy to `backends`.
    Forward,
}

/// Processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Registry id; must match `listener.message_processor_id` to receive traffic.
    pub id: String,

    pub kind: ProcessorKind,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            kind: ProcessorKind::Echo,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier; also the pool registry key.
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Path prefix routed to this backend (longest match wins).
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

/// WebSocket upgrade configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Register the WebSocket upgrade handler.
    pub enabled: bool,

    /// Acceptable sub-protocols in preference order. Empty accepts the
    /// first one the client offers.
    pub sub_protocols: Vec<String>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sub_protocols: Vec::new(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
