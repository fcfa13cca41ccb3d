//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → timeouts.rs (enforce connect/request deadline)
//!     → On failure: report to the caller, no retry, no failover
//! ```

pub mod timeouts;

pub use timeouts::with_deadline;
