//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{extract::State, http::HeaderMap, routing::get, Router};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use simple_balancer::config::{parse_config, Mode, Settings};
use simple_balancer::http::HttpServer;
use simple_balancer::lifecycle::Shutdown;
use simple_balancer::load_balancer::BackendRegistry;
use simple_balancer::net::StreamServer;
use simple_balancer::security::AdmissionGate;

/// Headers seen by a capturing backend, one entry per request.
pub type Captured = Arc<Mutex<Vec<HeaderMap>>>;

#[derive(Clone)]
struct BackendState {
    body: &'static str,
    delay: Duration,
    seen: Captured,
}

async fn respond(State(state): State<BackendState>, headers: HeaderMap) -> &'static str {
    state.seen.lock().unwrap().push(headers);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.body
}

/// Start an HTTP backend answering every path with `body` after `delay`.
pub async fn start_http_backend(body: &'static str, delay: Duration) -> (SocketAddr, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: Captured = Arc::default();

    let state = BackendState {
        body,
        delay,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/info", get(respond))
        .fallback(respond)
        .with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, seen)
}

/// Start a raw TCP backend that writes `greeting` on accept, then echoes.
pub async fn start_echo_backend(greeting: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        if socket.write_all(greeting.as_bytes()).await.is_err() {
                            return;
                        }
                        let mut buf = [0u8; 1024];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Validated settings on an ephemeral port.
pub fn settings(mode: Mode, backends: &[String], max_connections: usize, request_secs: u64) -> Settings {
    let list = backends
        .iter()
        .map(|b| format!("\"{b}\""))
        .collect::<Vec<_>>()
        .join(", ");
    parse_config(&format!(
        r#"
        mode = "{mode}"
        backends = [{list}]

        [server]
        bind = "127.0.0.1"
        port = 0
        max_connections = {max_connections}

        [timeouts]
        connect_secs = 1
        request_secs = {request_secs}
        "#
    ))
    .unwrap()
}

/// A running balancer and handles into its shared state.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub registry: Arc<BackendRegistry>,
    pub gate: AdmissionGate,
    pub shutdown: Shutdown,
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_http_proxy(settings: Settings) -> RunningProxy {
    let listener = TcpListener::bind(&settings.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&settings).unwrap();
    let registry = server.registry();
    let gate = server.gate();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        registry,
        gate,
        shutdown,
    }
}

pub async fn start_stream_proxy(settings: Settings) -> RunningProxy {
    let listener = TcpListener::bind(&settings.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = StreamServer::new(&settings).unwrap();
    let registry = server.registry();
    let gate = server.gate();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        registry,
        gate,
        shutdown,
    }
}

/// HTTP client that never reuses connections or honours proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
