//! Byte-stream forwarding for TCP mode.
//!
//! # Responsibilities
//! - Connect to the selected backend within the connect deadline
//! - Copy bytes both ways until either peer closes or fails
//! - Close both sides when the relay ends
//!
//! # Design Decisions
//! - A client EOF is a half-close: it is passed on to the backend and the
//!   backend's reply is still delivered until the backend closes
//! - A backend EOF or any I/O error ends the relay in both directions
//! - Read/write failures are attributed to the side they happened on

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::ProxyError;
use crate::load_balancer::{Backend, BackendAddr};
use crate::resilience::with_deadline;

/// Default buffer size for streaming
const BUFFER_SIZE: usize = 8192;

/// Which peer ended a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedBy {
    Client,
    Backend,
}

/// Forwards accepted TCP connections to stream backends.
#[derive(Debug, Clone)]
pub struct StreamForwarder {
    connect_timeout: Duration,
}

impl StreamForwarder {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Open a connection to `backend`.
    pub async fn connect(&self, backend: &Backend) -> Result<TcpStream, ProxyError> {
        let name = backend.addr().to_string();
        let BackendAddr::Stream { host, port } = backend.addr() else {
            return Err(ProxyError::UnsupportedBackend(name));
        };

        with_deadline(self.connect_timeout, &name, async {
            TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| ProxyError::BackendUnreachable {
                    backend: name.clone(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    /// Relay `inbound` to `backend` until one side closes.
    ///
    /// On a connect failure `inbound` is dropped, which closes it.
    pub async fn forward(&self, inbound: TcpStream, backend: &Arc<Backend>) -> Result<ClosedBy, ProxyError> {
        let _dispatch = backend.dispatch();
        let outbound = self.connect(backend).await?;
        let _ = outbound.set_nodelay(true);
        relay(inbound, outbound, &backend.addr().to_string()).await
    }
}

enum PumpError {
    Read(io::Error),
    Write(io::Error),
}

/// Copy from `reader` to `writer` until EOF, then shut `writer` down so the
/// peer sees the EOF too. Returns the byte count.
async fn pump<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, PumpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await.map_err(PumpError::Read)?;
        if n == 0 {
            // The peer may already be gone; the EOF was delivered either way.
            let _ = writer.shutdown().await;
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await.map_err(PumpError::Write)?;
        writer.flush().await.map_err(PumpError::Write)?;
        total += n as u64;
    }
}

/// Relay bytes between `client` and `backend` in both directions.
///
/// When the client stops sending, the backend gets an EOF and its reply keeps
/// flowing until it closes (`ClosedBy::Client`). When the backend closes
/// first, or either side fails, the relay ends at once. Both sides are shut
/// down and dropped before returning.
pub async fn relay<C, B>(client: C, backend: B, backend_name: &str) -> Result<ClosedBy, ProxyError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let lost_backend = |e: io::Error| ProxyError::BackendUnreachable {
        backend: backend_name.to_string(),
        reason: e.to_string(),
    };

    let outcome = {
        let upstream = pump(&mut client_read, &mut backend_write);
        let downstream = pump(&mut backend_read, &mut client_write);
        tokio::pin!(upstream);
        tokio::pin!(downstream);

        tokio::select! {
            sent = &mut upstream => match sent {
                Ok(bytes) => {
                    tracing::debug!(backend = %backend_name, bytes, "Client finished sending");
                    match downstream.await {
                        Ok(bytes) => {
                            tracing::debug!(backend = %backend_name, bytes, "Backend finished replying");
                            Ok(ClosedBy::Client)
                        }
                        Err(PumpError::Read(e)) => Err(lost_backend(e)),
                        Err(PumpError::Write(_)) => Err(ProxyError::ClientAborted),
                    }
                }
                Err(PumpError::Read(_)) => Err(ProxyError::ClientAborted),
                Err(PumpError::Write(e)) => Err(lost_backend(e)),
            },
            received = &mut downstream => match received {
                Ok(bytes) => {
                    tracing::debug!(backend = %backend_name, bytes, "Backend closed the connection");
                    Ok(ClosedBy::Backend)
                }
                Err(PumpError::Read(e)) => Err(lost_backend(e)),
                Err(PumpError::Write(_)) => Err(ProxyError::ClientAborted),
            },
        }
    };

    let _ = client_write.shutdown().await;
    let _ = backend_write.shutdown().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn relays_both_directions_until_backend_closes() {
        let (mut client_app, client_proxy) = duplex(64);
        let (backend_proxy, mut backend_app) = duplex(64);
        let task = tokio::spawn(async move { relay(client_proxy, backend_proxy, "b1").await });

        client_app.write_all(b"Hello world!\n").await.unwrap();
        let mut buf = [0u8; 13];
        backend_app.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"Hello world!\n");

        backend_app.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        client_app.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(backend_app);
        assert_eq!(task.await.unwrap().unwrap(), ClosedBy::Backend);

        let mut rest = Vec::new();
        assert_eq!(client_app.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn client_half_close_still_receives_backend_reply() {
        let (mut client_app, client_proxy) = duplex(64);
        let (backend_proxy, mut backend_app) = duplex(64);
        let task = tokio::spawn(async move { relay(client_proxy, backend_proxy, "b1").await });

        client_app.write_all(b"REQUEST").await.unwrap();
        client_app.shutdown().await.unwrap();

        let mut request = Vec::new();
        backend_app.read_to_end(&mut request).await.unwrap();
        assert_eq!(request, b"REQUEST");

        backend_app.write_all(b"RESPONSE").await.unwrap();
        drop(backend_app);

        let mut response = Vec::new();
        client_app.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"RESPONSE");
        assert_eq!(task.await.unwrap().unwrap(), ClosedBy::Client);
    }

    #[tokio::test]
    async fn reply_to_vanished_client_is_client_aborted() {
        let (client_app, client_proxy) = duplex(64);
        let (backend_proxy, mut backend_app) = duplex(64);
        let task = tokio::spawn(async move { relay(client_proxy, backend_proxy, "b1").await });

        drop(client_app);
        let mut rest = Vec::new();
        assert_eq!(backend_app.read_to_end(&mut rest).await.unwrap(), 0);

        backend_app.write_all(b"late").await.unwrap();
        assert!(matches!(task.await.unwrap(), Err(ProxyError::ClientAborted)));
    }

    #[tokio::test]
    async fn connect_failure_is_backend_unreachable() {
        // Grab a free port, then release it so nothing listens there.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = Backend::new(BackendAddr::Stream {
            host: "127.0.0.1".into(),
            port,
        });
        let forwarder = StreamForwarder::new(Duration::from_secs(2));
        let err = forwarder.connect(&backend).await.unwrap_err();
        assert!(matches!(err, ProxyError::BackendUnreachable { .. }), "{err}");
    }

    #[tokio::test]
    async fn http_backend_is_unsupported() {
        let backend = Backend::new(BackendAddr::parse_http("http://127.0.0.1:1").unwrap());
        let forwarder = StreamForwarder::new(Duration::from_secs(1));
        assert!(matches!(
            forwarder.connect(&backend).await,
            Err(ProxyError::UnsupportedBackend(_))
        ));
    }
}
