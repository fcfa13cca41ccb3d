//! Round-robin load balancer library.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::{Mode, ProxyConfig, Settings};
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::BackendRegistry;
pub use net::StreamServer;
pub use security::AdmissionGate;
