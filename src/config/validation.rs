//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require bind address, port, connection limit and a backend list
//! - Parse every backend address into its mode's variant, once
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<Settings, Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::loader::parse_balance;
use crate::config::schema::{Mode, ObservabilityConfig, ProxyConfig};
use crate::load_balancer::{AddrError, BackendAddr};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.bind is required")]
    MissingBind,
    #[error("server.port is required")]
    MissingPort,
    #[error("server.max_connections is required")]
    MissingMaxConnections,
    #[error("server.max_connections must be greater than zero")]
    ZeroMaxConnections,
    #[error("at least one backend is required")]
    NoBackends,
    #[error("backend #{index}: {source}")]
    InvalidBackend {
        index: usize,
        #[source]
        source: AddrError,
    },
    #[error("timeouts.connect_secs must be greater than zero")]
    ZeroConnectTimeout,
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
    #[error("limits.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validated settings handed to the core. Nothing in here is re-parsed later.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    /// `host:port` the listener binds to.
    pub bind_address: String,
    pub max_connections: usize,
    /// Backends in rotation order.
    pub backends: Vec<BackendAddr>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub observability: ObservabilityConfig,
}

/// Check the configuration and turn it into [`Settings`].
pub fn validate_config(config: &ProxyConfig) -> Result<Settings, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let bind = config.server.bind.as_deref().map(str::trim).filter(|b| !b.is_empty());
    if bind.is_none() {
        errors.push(ValidationError::MissingBind);
    }
    if config.server.port.is_none() {
        errors.push(ValidationError::MissingPort);
    }
    match config.server.max_connections {
        None => errors.push(ValidationError::MissingMaxConnections),
        Some(0) => errors.push(ValidationError::ZeroMaxConnections),
        Some(_) => {}
    }

    let mut raw_backends: Vec<String> = config.backends.clone();
    if let Some(balancers) = &config.balancers {
        raw_backends.extend(parse_balance(balancers));
    }
    if raw_backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut backends = Vec::with_capacity(raw_backends.len());
    for (index, raw) in raw_backends.iter().enumerate() {
        let parsed = match config.mode {
            Mode::Tcp => BackendAddr::parse_stream(raw),
            Mode::Http => BackendAddr::parse_http(raw),
        };
        match parsed {
            Ok(addr) => backends.push(addr),
            Err(source) => errors.push(ValidationError::InvalidBackend { index, source }),
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Every `None` above produced an error, so these are present.
    let (Some(bind), Some(port), Some(max_connections)) =
        (bind, config.server.port, config.server.max_connections)
    else {
        return Err(errors);
    };

    let bind_address = if bind.contains(':') {
        format!("[{}]:{}", bind, port)
    } else {
        format!("{}:{}", bind, port)
    };

    Ok(Settings {
        mode: config.mode,
        bind_address,
        max_connections,
        backends,
        connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
        request_timeout: Duration::from_secs(config.timeouts.request_secs),
        max_body_bytes: config.limits.max_body_bytes,
        observability: config.observability.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerConfig;

    fn base_config() -> ProxyConfig {
        ProxyConfig {
            server: ServerConfig {
                bind: Some("127.0.0.1".into()),
                port: Some(8080),
                max_connections: Some(10),
            },
            backends: vec!["http://127.0.0.1:3001".into()],
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn accepts_minimal_config() {
        let settings = validate_config(&base_config()).unwrap();
        assert_eq!(settings.bind_address, "127.0.0.1:8080");
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.mode, Mode::Http);
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert!(matches!(settings.backends[0], BackendAddr::Http { .. }));
    }

    #[test]
    fn reports_every_missing_field() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingBind,
                ValidationError::MissingPort,
                ValidationError::MissingMaxConnections,
                ValidationError::NoBackends,
            ]
        );
    }

    #[test]
    fn parses_backends_for_the_configured_mode() {
        let mut config = base_config();
        config.mode = Mode::Tcp;
        config.backends = vec!["0.0.0.0:3000".into()];
        config.balancers = Some("0.0.0.0:3001, 0.0.0.0:3002".into());

        let settings = validate_config(&config).unwrap();
        let addrs: Vec<String> = settings.backends.iter().map(|b| b.to_string()).collect();
        assert_eq!(addrs, vec!["0.0.0.0:3000", "0.0.0.0:3001", "0.0.0.0:3002"]);

        config.backends = vec!["http://0.0.0.0:3000".into()];
        config.balancers = None;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidBackend { index: 0, .. }));
    }

    #[test]
    fn rejects_zero_limits() {
        let mut config = base_config();
        config.server.max_connections = Some(0);
        config.timeouts.request_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ZeroMaxConnections, ValidationError::ZeroRequestTimeout]
        );
    }

    #[test]
    fn formats_ipv6_bind_address() {
        let mut config = base_config();
        config.server.bind = Some("::1".into());
        assert_eq!(validate_config(&config).unwrap().bind_address, "[::1]:8080");
    }
}
