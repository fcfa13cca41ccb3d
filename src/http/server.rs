//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (tracing, admission gate, body limit)
//! - Select a backend per admitted request and forward to it
//! - Serve until the shutdown signal fires

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::{Mode, Settings};
use crate::error::ProxyError;
use crate::http::forwarder::RequestForwarder;
use crate::http::request::ForwardContext;
use crate::load_balancer::{BackendRegistry, EmptyRegistry};
use crate::observability::metrics;
use crate::security::limits::AdmissionGate;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub forwarder: RequestForwarder,
    /// Address the proxy is serving on, reported as `by=` in `Forwarded`.
    pub proxy_addr: SocketAddr,
}

/// HTTP entry point for the balancer.
pub struct HttpServer {
    registry: Arc<BackendRegistry>,
    gate: AdmissionGate,
    forwarder: RequestForwarder,
    max_body_bytes: usize,
}

impl HttpServer {
    /// Create a new HTTP server with the given settings.
    pub fn new(settings: &Settings) -> Result<Self, EmptyRegistry> {
        Ok(Self {
            registry: Arc::new(BackendRegistry::new(settings.backends.clone())?),
            gate: AdmissionGate::new(settings.max_connections),
            forwarder: RequestForwarder::new(
                settings.connect_timeout,
                settings.request_timeout,
                settings.max_body_bytes,
            ),
            max_body_bytes: settings.max_body_bytes,
        })
    }

    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.clone()
    }

    pub fn gate(&self) -> AdmissionGate {
        self.gate.clone()
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The admission gate wraps the handler, so a rejected request never
    /// reaches the selector.
    pub fn router(&self, proxy_addr: SocketAddr) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            forwarder: self.forwarder.clone(),
            proxy_addr,
        };

        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(self.max_body_bytes))
            .layer(middleware::from_fn_with_state(self.gate.clone(), admission))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.gate.capacity(),
            backends = self.registry.len(),
            "HTTP server starting"
        );

        let app = self.router(addr).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Admission middleware: hold a permit for the whole request or answer 503.
async fn admission(State(gate): State<AdmissionGate>, request: Request, next: Next) -> Response {
    match gate.try_acquire() {
        Ok(token) => {
            metrics::record_admission(Mode::Http, true);
            let _active = metrics::track_active(Mode::Http);
            let response = next.run(request).await;
            token.release();
            response
        }
        Err(busy) => {
            metrics::record_admission(Mode::Http, false);
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                error = %busy,
                "Request rejected"
            );
            ProxyError::from(busy).into_response()
        }
    }
}

/// Main proxy handler.
/// Selects a backend and forwards the request to it.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let backend = state.registry.select();
    let backend_name = backend.addr().to_string();
    metrics::record_dispatch(Mode::Http, &backend_name);

    tracing::info!(
        client = %client_addr,
        backend = %backend_name,
        method = %method,
        path = %path,
        "Forwarding request"
    );

    let ctx = ForwardContext {
        proxy_addr: state.proxy_addr,
        client_addr,
    };

    let response = match state.forwarder.forward(request, &backend, &ctx).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ProxyError::BackendTimeout { timeout, .. } => tracing::warn!(
                    backend = %backend_name,
                    path = %path,
                    timeout = ?timeout,
                    "Backend timed out"
                ),
                ProxyError::BackendUnreachable { reason, .. } => tracing::warn!(
                    backend = %backend_name,
                    path = %path,
                    error = %reason,
                    "Backend unreachable"
                ),
                other => tracing::error!(
                    backend = %backend_name,
                    path = %path,
                    error = %other,
                    "Forwarding failed"
                ),
            }
            if e.is_backend_failure() {
                metrics::record_backend_failure(Mode::Http, &backend_name, e.kind());
            }
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
