//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.
//! Values the proxy cannot start without are `Option`s so that validation can
//! report every missing one at once.

use serde::{Deserialize, Serialize};

/// Which entry point the balancer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// HTTP request/response relay.
    #[default]
    Http,
    /// Raw TCP byte relay.
    Tcp,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Http => f.write_str("http"),
            Mode::Tcp => f.write_str("tcp"),
        }
    }
}

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Forwarding mode.
    pub mode: Mode,

    /// Backend addresses in rotation order (`host:port` or `http://` URLs).
    pub backends: Vec<String>,

    /// Comma-separated backend list, appended after `backends`.
    pub balancers: Option<String>,

    /// Listener configuration.
    pub server: ServerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0").
    pub bind: Option<String>,

    /// Bind port.
    pub port: Option<u16>,

    /// Maximum concurrent connections (load shedding above this).
    pub max_connections: Option<usize>,
}

/// Timeout configuration for backend calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for one backend call (connect, send, full response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 10,
        }
    }
}

/// Size limits for HTTP mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body forwarded and response body buffered, in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
