//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProcessorKind;
    use std::io::Write;

    #[test]
    fn loads_partial_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[listener]
id = "edge"
bind_address = "127.0.0.1:9000"
message_processor_id = "proxy"

[processor]
id = "proxy"
kind = "forward"

[[backends]]
name = "api"
address = "127.0.0.1:3000"
path_prefix = "/api"

[timeouts]
idle_secs = 5
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.id, "edge");
        assert_eq!(config.listener.max_connections, 10_000);
        assert_eq!(config.processor.kind, ProcessorKind::Forward);
        assert_eq!(config.backends[0].path_prefix, "/api");
        assert_eq!(config.timeouts.idle_secs, 5);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.websocket.enabled);
    }

    #[test]
    fn validation_errors_surface() {
        let err = parse_config("[listener]\nmax_connections = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("listener.max_connections"));
    }

    #[test]
    fn syntax_errors_surface() {
        let err = parse_config("[listener\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
