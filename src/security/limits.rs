//! Connection admission limits.
//!
//! # Responsibilities
//! - Bound the number of connections/requests in flight
//! - Shed load immediately when the bound is reached
//!
//! # Design Decisions
//! - Non-blocking: `try_acquire` never waits for a permit
//! - A permit is an owned RAII token; dropping it is the only way to release
//! - Pool size fixed at construction

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Returned when every permit is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("503 too busy")]
pub struct Busy {
    /// Size of the pool that was exhausted.
    pub capacity: usize,
}

/// Fixed-size, non-blocking permit pool.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` concurrent holders.
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a permit if one is free right now.
    pub fn try_acquire(&self) -> Result<AdmissionToken, Busy> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Ok(AdmissionToken { _permit: permit }),
            // The semaphore is never closed; treat it like exhaustion anyway.
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => Err(Busy {
                capacity: self.capacity,
            }),
        }
    }

    /// Configured pool size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// A held admission slot.
///
/// Released when dropped, so every exit path of the owning task gives it back.
#[derive(Debug)]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionToken {
    /// Give the slot back before the end of scope.
    pub fn release(self) {}
}
