//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, admission middleware, backend selection)
//!     → forwarder.rs (deadline, backend call, failure classification)
//!     → request.rs (target URI, Host rewrite, Forwarded header)
//!     → response.rs (status/headers/body copy, error statuses)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::RequestForwarder;
pub use request::ForwardContext;
pub use server::HttpServer;
