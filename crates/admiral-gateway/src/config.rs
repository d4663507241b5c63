//! Gateway configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the HTTP layer.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:3000").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// `max-age` sent with list responses, in seconds.
    #[serde(default = "GatewayConfig::default_list_max_age")]
    pub list_max_age_seconds: u32,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:3000".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        60
    }

    const fn default_list_max_age() -> u32 {
        60
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// The `Cache-Control` value for list responses.
    #[must_use]
    pub fn list_cache_control(&self) -> String {
        format!("private, max-age={}", self.list_max_age_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            list_max_age_seconds: Self::default_list_max_age(),
        }
    }
}
