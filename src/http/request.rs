//! Outbound request construction.
//!
//! # Responsibilities
//! - Point the request at the backend URL, keeping method, path, query, body
//! - Rewrite `Host` to the backend's authority
//! - Set the `Forwarded` header (by, for, host, proto)
//! - Drop hop-by-hop headers
//!
//! # Design Decisions
//! - The outbound request always uses the client's default HTTP version;
//!   the inbound version is only reported through `proto`
//! - An existing `Forwarded` header is replaced, not extended

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, FORWARDED, HOST};
use axum::http::{HeaderMap, Request, Uri, Version};
use std::net::SocketAddr;
use url::Url;

use crate::error::ProxyError;

/// Addresses needed to describe a forwarded request.
#[derive(Debug, Clone, Copy)]
pub struct ForwardContext {
    /// Address the proxy accepted the request on.
    pub proxy_addr: SocketAddr,
    /// Remote address of the client.
    pub client_addr: SocketAddr,
}

/// Headers that describe a single hop and are never relayed.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Protocol string as it appears on the request line.
pub fn proto(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// `Forwarded` header value for one hop.
pub fn forwarded_value(ctx: &ForwardContext, original_host: &str, version: Version) -> String {
    format!(
        "by={}; for={}; host={}; proto={}",
        ctx.proxy_addr,
        ctx.client_addr,
        original_host,
        proto(version)
    )
}

/// Backend URL followed by the original path and query.
pub fn upstream_uri(backend: &Url, original: &Uri) -> Result<Uri, ProxyError> {
    let path_and_query = original.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let base = backend.as_str().trim_end_matches('/');
    format!("{}{}", base, path_and_query)
        .parse::<Uri>()
        .map_err(|e| ProxyError::InvalidUpstreamRequest(e.to_string()))
}

/// Turn the inbound request into the request sent to `backend`.
pub fn build_outbound(
    request: Request<Body>,
    backend: &Url,
    ctx: &ForwardContext,
) -> Result<Request<Body>, ProxyError> {
    let (parts, body) = request.into_parts();

    let original_host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let uri = upstream_uri(backend, &parts.uri)?;

    let mut headers = HeaderMap::with_capacity(parts.headers.len() + 2);
    for (name, value) in parts.headers.iter() {
        if name == HOST || name == FORWARDED || is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(authority) = uri.authority() {
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|e| ProxyError::InvalidUpstreamRequest(e.to_string()))?;
        headers.insert(HOST, host);
    }

    let forwarded = forwarded_value(ctx, &original_host, parts.version);
    let forwarded = HeaderValue::from_str(&forwarded)
        .map_err(|e| ProxyError::InvalidUpstreamRequest(e.to_string()))?;
    headers.insert(FORWARDED, forwarded);

    let mut outbound = Request::new(body);
    *outbound.method_mut() = parts.method;
    *outbound.uri_mut() = uri;
    *outbound.headers_mut() = headers;
    Ok(outbound)
}
