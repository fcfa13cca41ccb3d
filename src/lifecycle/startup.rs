//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Bind the listener
//! - Run the entry point for the configured mode until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, once everything behind it is built

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{Mode, Settings};
use crate::http::HttpServer;
use crate::load_balancer::EmptyRegistry;
use crate::net::listener::ListenerError;
use crate::net::server::StreamServer;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Registry(#[from] EmptyRegistry),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind the listener named by `settings`.
pub async fn bind(settings: &Settings) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&settings.bind_address)
        .await
        .map_err(|source| {
            StartupError::Listener(ListenerError::Bind {
                address: settings.bind_address.clone(),
                source,
            })
        })
}

/// Run the entry point for `settings.mode` on an already bound listener.
pub async fn serve(
    settings: Settings,
    listener: TcpListener,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    match settings.mode {
        Mode::Http => HttpServer::new(&settings)?.run(listener, shutdown).await?,
        Mode::Tcp => StreamServer::new(&settings)?.run(listener, shutdown).await?,
    }
    Ok(())
}

/// Start the balancer and block until shutdown.
pub async fn run(settings: Settings, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
    if settings.observability.metrics_enabled {
        // Validation already checked the address.
        if let Ok(addr) = settings.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr);
        }
    }

    let listener = bind(&settings).await?;
    tracing::info!(
        mode = %settings.mode,
        address = %listener.local_addr()?,
        backends = settings.backends.len(),
        max_connections = settings.max_connections,
        "Listening for connections"
    );

    serve(settings, listener, shutdown).await
}
