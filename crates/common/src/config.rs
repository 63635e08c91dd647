//! Service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// OpenWeatherMap API key. Empty is allowed — the service then runs
    /// entirely on fallback data.
    #[serde(default)]
    pub api_key: String,

    /// Host the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// City served when a request does not name one.
    #[serde(default = "default_city")]
    pub default_city: String,

    /// Cache behavior.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upstream API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window in seconds. Doubles as the background refresh
    /// cadence — every tracked city is re-fetched on this interval.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

/// Upstream (OpenWeatherMap) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API base URL, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3023
}

fn default_city() -> String {
    "London".into()
}

fn default_ttl() -> u64 {
    180
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}

fn default_timeout() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: default_host(),
            port: default_port(),
            default_city: default_city(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}
