//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::KitConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
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
pub fn parse_config(content: &str) -> Result<KitConfig, ConfigError> {
    let config: KitConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<KitConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_joined() {
        let error = parse_config("[server]\nrequest_timeout_secs = 0\nmax_body_bytes = 0\n")
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Validation failed: server.request_timeout_secs: must be greater than 0, \
             server.max_body_bytes: must be greater than 0"
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let error = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(error, ConfigError::Io(_)));
    }
}
