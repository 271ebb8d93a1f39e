//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: KitConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::KitConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// One rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_prefix(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.is_empty() {
        return;
    }
    if !value.starts_with('/') {
        errors.push(ValidationError::new(field, "must be empty or start with '/'"));
    }
    if value.ends_with('/') {
        errors.push(ValidationError::new(field, "must not end with '/'"));
    }
}

pub fn validate_config(config: &KitConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("{:?} is not a socket address", server.bind_address),
        ));
    }

    if let Some(origin) = &server.origin {
        match Url::parse(origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.path() == "/" => {}
            _ => errors.push(ValidationError::new(
                "server.origin",
                format!("{origin:?} must be protocol://host with no path"),
            )),
        }
    }

    if !matches!(server.protocol.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "server.protocol",
            "must be \"http\" or \"https\"",
        ));
    }

    if server.host_header.is_empty() {
        errors.push(ValidationError::new("server.host_header", "must not be empty"));
    }
    if server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if server.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "server.max_body_bytes",
            "must be greater than 0",
        ));
    }

    check_prefix("paths.base", &config.paths.base, &mut errors);
    check_prefix("paths.assets", &config.paths.assets, &mut errors);

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&KitConfig::default()).is_ok());
    }

    #[test]
    fn test_all_errors_are_reported() {
        let mut config = KitConfig::default();
        config.server.bind_address = "nowhere".into();
        config.server.origin = Some("https://example.com/app".into());
        config.paths.base = "docs/".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "server.origin",
                "paths.base",
                "paths.base",
                "observability.log_level",
            ]
        );
    }
}
