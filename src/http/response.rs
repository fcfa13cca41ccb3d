//! Response handling and transformation.
//!
//! # Responsibilities
//! - Copy the backend status, headers and body to the client
//! - Map proxy errors to HTTP status codes
//!
//! # Design Decisions
//! - Multi-valued headers are re-emitted as one line joined with `;`
//! - Hop-by-hop headers are dropped since the body is re-framed here
//! - Unreachable and timed-out backends both answer 503

use axum::body::{Body, Bytes};
use axum::http::header::{GetAll, HeaderValue};
use axum::http::response::Parts;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;

use crate::error::ProxyError;
use crate::http::request::is_hop_by_hop;

/// Build the client response from a fully read backend response.
pub fn relay_response(parts: Parts, body: Bytes) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = parts.status;

    let headers = response.headers_mut();
    for name in parts.headers.keys() {
        if is_hop_by_hop(name) {
            continue;
        }
        if let Some(value) = join_values(parts.headers.get_all(name)) {
            headers.insert(name.clone(), value);
        }
    }
    response
}

fn join_values(values: GetAll<'_, HeaderValue>) -> Option<HeaderValue> {
    let joined = values
        .iter()
        .map(HeaderValue::as_bytes)
        .collect::<Vec<_>>()
        .join(&b';');
    HeaderValue::from_bytes(&joined).ok()
}

/// Status code the client sees for `error`.
pub fn status_for(error: &ProxyError) -> StatusCode {
    match error {
        ProxyError::AdmissionRejected { .. }
        | ProxyError::BackendUnreachable { .. }
        | ProxyError::BackendTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ProxyError::ClientAborted => StatusCode::BAD_REQUEST,
        ProxyError::UnsupportedBackend(_)
        | ProxyError::InvalidUpstreamRequest(_)
        | ProxyError::ResponseTooLarge { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        let reason = match &self {
            ProxyError::AdmissionRejected { .. } => "503 too busy",
            ProxyError::BackendUnreachable { .. } | ProxyError::BackendTimeout { .. } => "Service Unavailable",
            ProxyError::ClientAborted => "Bad Request",
            _ => "Bad Gateway",
        };
        (status_for(&self), reason).into_response()
    }
}
