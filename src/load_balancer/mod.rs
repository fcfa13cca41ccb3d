//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted connection
//!     → pool.rs (BackendRegistry::select)
//!     → round_robin.rs (read and advance the cursor atomically)
//!     → backend.rs (record the dispatch, hand the address to a forwarder)
//! ```
//!
//! # Design Decisions
//! - Plain round-robin: no weights, no health filtering
//! - Backend addresses parsed once at config load, never re-parsed
//! - Per-backend counters are telemetry, not selection input

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::{AddrError, Backend, BackendAddr, BackendConnectionGuard};
pub use pool::{BackendRegistry, EmptyRegistry};
