//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_admissions_total` (counter): admitted / rejected by mode
//! - `proxy_dispatches_total` (counter): dispatches by mode, backend
//! - `proxy_backend_failures_total` (counter): failures by mode, backend, kind
//! - `proxy_requests_total` (counter): HTTP requests by method, status
//! - `proxy_request_duration_seconds` (histogram): HTTP latency
//! - `proxy_active_connections` (gauge): admitted work in flight by mode
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::Mode;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(mode: Mode, admitted: bool) {
    let outcome = if admitted { "admitted" } else { "rejected" };
    metrics::counter!("proxy_admissions_total", "mode" => mode.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_dispatch(mode: Mode, backend: &str) {
    metrics::counter!("proxy_dispatches_total", "mode" => mode.to_string(), "backend" => backend.to_string())
        .increment(1);
}

pub fn record_backend_failure(mode: Mode, backend: &str, kind: &'static str) {
    metrics::counter!(
        "proxy_backend_failures_total",
        "mode" => mode.to_string(),
        "backend" => backend.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!("proxy_requests_total", "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Track admitted work in flight; the gauge is decremented when the guard drops.
pub fn track_active(mode: Mode) -> ActiveGauge {
    metrics::gauge!("proxy_active_connections", "mode" => mode.to_string()).increment(1.0);
    ActiveGauge { mode }
}

#[derive(Debug)]
pub struct ActiveGauge {
    mode: Mode,
}

impl Drop for ActiveGauge {
    fn drop(&mut self) {
        metrics::gauge!("proxy_active_connections", "mode" => self.mode.to_string()).decrement(1.0);
    }
}
