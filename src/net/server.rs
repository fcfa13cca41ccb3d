//! TCP entry point.
//!
//! # Responsibilities
//! - Accept loop: admit or shed each connection
//! - Pick a backend for every admitted connection and spawn its relay
//! - Keep per-connection failures inside the connection's task

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::{Mode, Settings};
use crate::error::ProxyError;
use crate::load_balancer::{BackendRegistry, EmptyRegistry};
use crate::net::connection::ConnectionIds;
use crate::net::listener::{Accepted, Listener, ListenerError};
use crate::net::relay::StreamForwarder;
use crate::observability::metrics;
use crate::security::limits::{AdmissionGate, AdmissionToken};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Round-robin TCP balancer.
pub struct StreamServer {
    registry: Arc<BackendRegistry>,
    gate: AdmissionGate,
    forwarder: StreamForwarder,
}

impl StreamServer {
    /// Build the registry, gate and forwarder from validated settings.
    pub fn new(settings: &Settings) -> Result<Self, EmptyRegistry> {
        Ok(Self {
            registry: Arc::new(BackendRegistry::new(settings.backends.clone())?),
            gate: AdmissionGate::new(settings.max_connections),
            forwarder: StreamForwarder::new(settings.connect_timeout),
        })
    }

    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.clone()
    }

    pub fn gate(&self) -> AdmissionGate {
        self.gate.clone()
    }

    /// Run the accept loop on `listener` until `shutdown` fires.
    ///
    /// Relays already running are left to finish on their own.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let listener = Listener::from_listener(listener, self.gate.clone());
        let mut ids = ConnectionIds::default();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(Accepted::Admitted { stream, peer_addr, token }) => {
                        metrics::record_admission(Mode::Tcp, true);
                        let registry = self.registry.clone();
                        let forwarder = self.forwarder.clone();
                        let id = ids.next_id();
                        tokio::spawn(
                            handle_connection(stream, peer_addr, token, registry, forwarder)
                                .instrument(tracing::info_span!("connection", connection_id = %id)),
                        );
                    }
                    Ok(Accepted::Rejected { stream, peer_addr, busy }) => {
                        metrics::record_admission(Mode::Tcp, false);
                        tracing::debug!(client = %peer_addr, error = %busy, "Connection rejected");
                        drop(stream);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed");
                        // Back off briefly, e.g. while out of file descriptors.
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("TCP listener received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    token: AdmissionToken,
    registry: Arc<BackendRegistry>,
    forwarder: StreamForwarder,
) {
    let _token = token;
    let _active = metrics::track_active(Mode::Tcp);

    let backend = registry.select();
    let backend_name = backend.addr().to_string();
    metrics::record_dispatch(Mode::Tcp, &backend_name);
    tracing::info!(client = %peer_addr, backend = %backend_name, "Dispatching connection");

    match forwarder.forward(stream, &backend).await {
        Ok(closed_by) => {
            tracing::debug!(client = %peer_addr, backend = %backend_name, closed_by = ?closed_by, "Connection finished");
        }
        Err(ProxyError::ClientAborted) => {
            tracing::debug!(client = %peer_addr, backend = %backend_name, "Client aborted");
        }
        Err(e @ ProxyError::BackendTimeout { .. }) => {
            metrics::record_backend_failure(Mode::Tcp, &backend_name, e.kind());
            tracing::warn!(client = %peer_addr, error = %e, "Backend connect timed out");
        }
        Err(e) if e.is_backend_failure() => {
            metrics::record_backend_failure(Mode::Tcp, &backend_name, e.kind());
            tracing::warn!(client = %peer_addr, error = %e, "Backend unavailable");
        }
        Err(e) => {
            tracing::error!(client = %peer_addr, backend = %backend_name, error = %e, "Relay failed");
        }
    }
}
