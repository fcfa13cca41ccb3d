//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server and its address
//! - Track active connections and total dispatches (telemetry only)

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Reasons a backend address string is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    #[error("'{0}' is not of the form host:port")]
    MissingPort(String),
    #[error("'{0}' has an invalid port")]
    InvalidPort(String),
    #[error("'{0}' is not a valid URL: {1}")]
    InvalidUrl(String, String),
    #[error("'{0}' uses scheme '{1}', which this mode does not support")]
    UnsupportedScheme(String, String),
    #[error("'{0}' has no host")]
    MissingHost(String),
}

/// Where a backend lives, decided once when configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAddr {
    /// Raw TCP target.
    Stream { host: String, port: u16 },
    /// HTTP target given as an absolute URL.
    Http { url: Url },
}

impl BackendAddr {
    /// Parse a `host:port` pair for TCP mode.
    pub fn parse_stream(raw: &str) -> Result<Self, AddrError> {
        let raw = raw.trim();
        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(AddrError::UnsupportedScheme(raw.to_string(), scheme.to_string()));
        }
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| AddrError::MissingPort(raw.to_string()))?;
        if host.is_empty() {
            return Err(AddrError::MissingHost(raw.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddrError::InvalidPort(raw.to_string()))?;
        // Bracketed IPv6 literals are accepted as written in URLs.
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Ok(BackendAddr::Stream {
            host: host.to_string(),
            port,
        })
    }

    /// Parse an absolute `http://` URL for HTTP mode.
    pub fn parse_http(raw: &str) -> Result<Self, AddrError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| AddrError::InvalidUrl(raw.to_string(), e.to_string()))?;
        if url.scheme() != "http" {
            return Err(AddrError::UnsupportedScheme(
                raw.to_string(),
                url.scheme().to_string(),
            ));
        }
        if url.host_str().is_none() {
            return Err(AddrError::MissingHost(raw.to_string()));
        }
        Ok(BackendAddr::Http { url })
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendAddr::Stream { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            BackendAddr::Stream { host, port } => write!(f, "{}:{}", host, port),
            BackendAddr::Http { url } => f.write_str(url.as_str().trim_end_matches('/')),
        }
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    addr: BackendAddr,
    /// Connections currently routed here.
    active_connections: AtomicUsize,
    /// Connections ever routed here.
    dispatched_total: AtomicU64,
}

impl Backend {
    /// Create a new backend.
    pub fn new(addr: BackendAddr) -> Self {
        Self {
            addr,
            active_connections: AtomicUsize::new(0),
            dispatched_total: AtomicU64::new(0),
        }
    }

    /// The backend's address.
    pub fn addr(&self) -> &BackendAddr {
        &self.addr
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the number of connections ever dispatched here.
    pub fn dispatched_total(&self) -> u64 {
        self.dispatched_total.load(Ordering::Relaxed)
    }

    /// Record a dispatch. The returned guard decrements the active count on drop.
    pub fn dispatch(self: &Arc<Self>) -> BackendConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.dispatched_total.fetch_add(1, Ordering::Relaxed);
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
