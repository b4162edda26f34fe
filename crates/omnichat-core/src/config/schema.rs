//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main Omnichat configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings shared by every provider.
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-provider endpoint settings.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// HTTP client settings.
///
/// Reasoning models can think for minutes before the first byte arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout; also the longest silence tolerated mid-stream.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on the lifetime of a whole call, body included.
    #[serde(default = "default_resource_timeout")]
    pub resource_timeout_secs: u64,

    /// Time allowed to establish a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long idle pooled connections are kept.
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

fn default_resource_timeout() -> u64 {
    1800
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_pool_idle_timeout() -> u64 {
    90
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            resource_timeout_secs: default_resource_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

/// Providers configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// OpenAI endpoint settings.
    #[serde(default)]
    pub openai: EndpointConfig,

    /// Anthropic endpoint settings.
    #[serde(default)]
    pub anthropic: EndpointConfig,

    /// Google endpoint settings.
    #[serde(default)]
    pub google: EndpointConfig,
}

/// Endpoint override for a single provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL replacing the provider's public API root (proxies, tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}
