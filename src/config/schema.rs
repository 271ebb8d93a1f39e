//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::client::ClientOptions;
use crate::routing::TrailingSlash;
use crate::server::ServerOptions;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KitConfig {
    /// HTTP host settings.
    pub server: ServerConfig,

    /// Where the app and its assets are mounted.
    pub paths: PathsConfig,

    pub routing: RoutingConfig,

    pub observability: ObservabilityConfig,
}

impl KitConfig {
    /// Options for the response pipeline.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            trailing_slash: self.routing.trailing_slash,
            base: self.paths.base.clone(),
            assets: self.paths.assets.clone(),
            dev: self.server.dev,
        }
    }

    /// Options for the client navigation controller.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base: self.paths.base.clone(),
            trailing_slash: self.routing.trailing_slash,
            router: self.routing.router,
        }
    }
}

/// HTTP host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Fixed origin for every request (e.g., "https://example.com").
    /// Derived from `protocol` and the host header when unset.
    pub origin: Option<String>,

    /// Protocol used to derive the origin.
    pub protocol: String,

    /// Header carrying the host, for deployments behind a proxy.
    pub host_header: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Expose error detail in responses.
    pub dev: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            origin: None,
            protocol: "http".to_string(),
            host_header: "host".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
            dev: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path prefix of the app, without trailing slash ("" for the root).
    pub base: String,

    /// Prefix assets are served from; falls back to `base`.
    pub assets: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub trailing_slash: TrailingSlash,

    /// Enable client-side routing.
    pub router: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            trailing_slash: TrailingSlash::Never,
            router: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: KitConfig = toml::from_str(
            r#"
            [paths]
            base = "/docs"

            [routing]
            trailing_slash = "always"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.routing.trailing_slash, TrailingSlash::Always);
        assert!(config.routing.router);

        let options = config.server_options();
        assert_eq!(options.base, "/docs");
        assert!(!options.dev);

        let client = config.client_options();
        assert_eq!(client.base, "/docs");
        assert_eq!(client.trailing_slash, TrailingSlash::Always);
        assert!(client.router);
    }
}
