//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (listener references a configured processor)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{ProcessorKind, ServerConfig};

/// Placeholder key shipped in the default admin config.
const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("listener references processor '{0}' but processor.id is different")]
    UnknownProcessor(String),
    #[error("forward processor requires at least one backend")]
    NoBackends,
    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),
    #[error("admin API enabled with the placeholder api_key")]
    PlaceholderApiKey,
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.id.trim().is_empty() {
        errors.push(ValidationError::Empty("listener.id"));
    }
    check_address(&mut errors, "listener.bind_address", &listener.bind_address);
    if listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if listener.message_processor_id.trim().is_empty() {
        errors.push(ValidationError::Empty("listener.message_processor_id"));
    } else if listener.message_processor_id != config.processor.id {
        errors.push(ValidationError::UnknownProcessor(
            listener.message_processor_id.clone(),
        ));
    }

    if config.processor.kind == ProcessorKind::Forward && config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    let mut names = HashSet::new();
    for backend in &config.backends {
        if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        check_address(&mut errors, "backends.address", &backend.address);
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError::Zero("rate_limit.requests_per_second"));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::Zero("rate_limit.burst_size"));
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::PlaceholderApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
