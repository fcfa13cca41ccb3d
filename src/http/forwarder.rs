//! Request/response forwarding for HTTP mode.
//!
//! # Responsibilities
//! - Send the rewritten request to the selected backend
//! - Enforce the per-call deadline over connect, send and full response
//! - Classify failures as unreachable, timed out or oversized
//!
//! # Design Decisions
//! - The backend body is buffered so the deadline covers all of it
//! - No retry; the caller turns failures into a 503

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProxyError;
use crate::http::request::{build_outbound, ForwardContext};
use crate::http::response::relay_response;
use crate::load_balancer::{Backend, BackendAddr};
use crate::resilience::with_deadline;

/// Forwards inbound requests to HTTP backends.
#[derive(Clone)]
pub struct RequestForwarder {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl RequestForwarder {
    pub fn new(connect_timeout: Duration, request_timeout: Duration, max_body_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            request_timeout,
            max_body_bytes,
        }
    }

    /// Forward `request` to `backend` and translate its response.
    pub async fn forward(
        &self,
        request: Request<Body>,
        backend: &Arc<Backend>,
        ctx: &ForwardContext,
    ) -> Result<Response<Body>, ProxyError> {
        let _dispatch = backend.dispatch();
        let name = backend.addr().to_string();
        let BackendAddr::Http { url } = backend.addr() else {
            return Err(ProxyError::UnsupportedBackend(name));
        };

        let outbound = build_outbound(request, url, ctx)?;
        let limit = self.max_body_bytes;

        let (parts, body) = with_deadline(self.request_timeout, &name, async {
            let response: Response<Incoming> = self
                .client
                .request(outbound)
                .await
                .map_err(|e| ProxyError::BackendUnreachable {
                    backend: name.clone(),
                    reason: error_chain(&e),
                })?;

            let (parts, body) = response.into_parts();
            let declared = parts
                .headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            if declared.is_some_and(|len| len > limit) {
                return Err(ProxyError::ResponseTooLarge {
                    backend: name.clone(),
                    limit,
                });
            }

            // Chunked bodies carry no length up front; the cap applies while reading.
            let body = match Limited::new(body, limit).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    return Err(ProxyError::ResponseTooLarge {
                        backend: name.clone(),
                        limit,
                    });
                }
                Err(e) => {
                    return Err(ProxyError::BackendUnreachable {
                        backend: name.clone(),
                        reason: error_chain(&*e),
                    });
                }
            };
            Ok((parts, body))
        })
        .await?;

        Ok(relay_response(parts, body))
    }
}

/// Render an error with its sources, e.g. "client error (Connect): tcp connect error: Connection refused".
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
