//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection or request:
//!     → limits.rs (admission gate: admit or reject with 503 / close)
//!     → Pass to selector and forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: no permit, no backend contact
//! - Rejection happens before the round-robin cursor moves

pub mod limits;

pub use limits::{AdmissionGate, AdmissionToken, Busy};
