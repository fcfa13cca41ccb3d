//! Network layer subsystem (TCP mode).
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, admission gate: admit or close)
//!     → server.rs (pick backend, spawn per-connection task)
//!     → relay.rs (connect to backend, copy bytes both ways)
//!
//! Connection States:
//!     Accepted → Admitted | Rejected → Dispatched → Closed
//! ```
//!
//! # Design Decisions
//! - One task per admitted connection
//! - Admission token and sockets are released by Drop on every path
//! - No retry against another backend when a connect fails

pub mod connection;
pub mod listener;
pub mod relay;
pub mod server;

pub use listener::{Accepted, Listener, ListenerError};
pub use relay::{relay, ClosedBy, StreamForwarder};
pub use server::StreamServer;
