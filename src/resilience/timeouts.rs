//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a hard deadline
//! - Turn an elapsed deadline into `ProxyError::BackendTimeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry,
//!   which closes any half-finished backend connection
//! - Timeout errors stay distinct from connection errors so logs can tell
//!   them apart, even though clients see the same status

use std::future::Future;
use std::time::Duration;

use crate::error::ProxyError;

/// Run `call` against `backend`, failing with `BackendTimeout` after `deadline`.
pub async fn with_deadline<F, T>(deadline: Duration, backend: &str, call: F) -> Result<T, ProxyError>
where
    F: Future<Output = Result<T, ProxyError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ProxyError::BackendTimeout {
            backend: backend.to_string(),
            timeout: deadline,
        }),
    }
}
