//! Per-connection error taxonomy.
//!
//! Every variant is handled inside the task that owns the connection; none of
//! them reach the accept loop. Configuration and startup failures live in
//! [`crate::config::ConfigError`] and [`crate::lifecycle::startup::StartupError`].

use std::time::Duration;
use thiserror::Error;

/// Errors produced while admitting or forwarding one connection/request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The admission gate had no free permit.
    #[error("admission rejected: all {capacity} connection slots are in use")]
    AdmissionRejected { capacity: usize },

    /// The backend refused the connection, could not be resolved, or dropped
    /// the connection mid-exchange.
    #[error("backend {backend} unreachable: {reason}")]
    BackendUnreachable { backend: String, reason: String },

    /// The backend did not answer within the configured deadline.
    #[error("backend {backend} did not respond within {timeout:?}")]
    BackendTimeout { backend: String, timeout: Duration },

    /// The inbound peer went away before the exchange completed.
    #[error("client aborted the connection")]
    ClientAborted,

    /// The selected backend cannot be served by this entry point.
    #[error("backend {0} is not usable in this proxy mode")]
    UnsupportedBackend(String),

    /// The outbound request could not be constructed.
    #[error("invalid upstream request: {0}")]
    InvalidUpstreamRequest(String),

    /// The backend response body exceeded the configured limit.
    #[error("response from backend {backend} exceeds {limit} bytes")]
    ResponseTooLarge { backend: String, limit: usize },
}

impl ProxyError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::AdmissionRejected { .. } => "rejected",
            ProxyError::BackendUnreachable { .. } => "unreachable",
            ProxyError::BackendTimeout { .. } => "timeout",
            ProxyError::ClientAborted => "client_aborted",
            ProxyError::UnsupportedBackend(_) => "unsupported",
            ProxyError::InvalidUpstreamRequest(_) => "invalid_request",
            ProxyError::ResponseTooLarge { .. } => "too_large",
        }
    }

    /// True when the failure is attributable to the backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::BackendUnreachable { .. }
                | ProxyError::BackendTimeout { .. }
                | ProxyError::ResponseTooLarge { .. }
        )
    }
}

impl From<crate::security::limits::Busy> for ProxyError {
    fn from(busy: crate::security::limits::Busy) -> Self {
        ProxyError::AdmissionRejected {
            capacity: busy.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failure_classification() {
        let unreachable = ProxyError::BackendUnreachable {
            backend: "127.0.0.1:1".into(),
            reason: "connection refused".into(),
        };
        let timeout = ProxyError::BackendTimeout {
            backend: "127.0.0.1:1".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(unreachable.is_backend_failure());
        assert!(timeout.is_backend_failure());
        assert!(!ProxyError::ClientAborted.is_backend_failure());
        assert!(!ProxyError::AdmissionRejected { capacity: 1 }.is_backend_failure());
        assert_eq!(unreachable.kind(), "unreachable");
        assert_eq!(timeout.kind(), "timeout");
    }
}
