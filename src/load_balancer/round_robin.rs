//! Round-robin rotation.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotation cursor.
///
/// The cursor always stays in `[0, len)`: read and advance happen in a single
/// compare-and-swap so concurrent callers never observe the same position.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current position and move the cursor to the next one.
    ///
    /// `len` must be non-zero.
    pub fn next_index(&self, len: usize) -> usize {
        debug_assert!(len > 0);
        match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| Some((current + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Current position, without advancing.
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}
