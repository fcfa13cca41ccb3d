//! TCP listener with load shedding.
//!
//! # Responsibilities
//! - Accept incoming TCP connections
//! - Run every accepted connection through the admission gate
//!
//! # Design Decisions
//! - Accept first, then try for a permit: a full gate turns into an
//!   immediate close instead of a growing kernel backlog
//! - Accept errors are reported per call; the caller decides whether to go on

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::security::limits::{AdmissionGate, AdmissionToken, Busy};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// Outcome of one accept.
#[derive(Debug)]
pub enum Accepted {
    /// A permit was available; hold `token` for the connection's lifetime.
    Admitted {
        stream: TcpStream,
        peer_addr: SocketAddr,
        token: AdmissionToken,
    },
    /// The gate was full; the stream should be closed right away.
    Rejected {
        stream: TcpStream,
        peer_addr: SocketAddr,
        busy: Busy,
    },
}

/// A TCP listener that admits at most `gate.capacity()` concurrent connections.
pub struct Listener {
    inner: TcpListener,
    gate: AdmissionGate,
}

impl Listener {
    /// Wrap an already-bound listener.
    pub fn from_listener(inner: TcpListener, gate: AdmissionGate) -> Self {
        if let Ok(local_addr) = inner.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections = gate.capacity(),
                "Listener bound"
            );
        }
        Self { inner, gate }
    }

    /// Accept a new connection and try to admit it.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        match self.gate.try_acquire() {
            Ok(token) => {
                tracing::debug!(
                    peer_addr = %peer_addr,
                    available_permits = self.gate.available(),
                    "Connection accepted"
                );
                Ok(Accepted::Admitted {
                    stream,
                    peer_addr,
                    token,
                })
            }
            Err(busy) => Ok(Accepted::Rejected {
                stream,
                peer_addr,
                busy,
            }),
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
