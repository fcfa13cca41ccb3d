//! Backend registry.
//!
//! # Responsibilities
//! - Own the ordered, non-empty list of backends
//! - Hand out backends in round-robin order
//!
//! The cursor is private; `select` is the only operation that moves it.

use std::sync::Arc;
use thiserror::Error;

use crate::load_balancer::backend::{Backend, BackendAddr};
use crate::load_balancer::round_robin::RoundRobin;

/// A registry must hold at least one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("backend registry requires at least one backend")]
pub struct EmptyRegistry;

/// Ordered backends plus the rotation cursor.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
    rotation: RoundRobin,
}

impl BackendRegistry {
    /// Build a registry from already-parsed addresses, keeping their order.
    pub fn new(addrs: Vec<BackendAddr>) -> Result<Self, EmptyRegistry> {
        if addrs.is_empty() {
            return Err(EmptyRegistry);
        }
        let backends = addrs
            .into_iter()
            .map(|addr| Arc::new(Backend::new(addr)))
            .collect();
        Ok(Self {
            backends,
            rotation: RoundRobin::new(),
        })
    }

    /// Return the backend at the cursor and advance the cursor.
    pub fn select(&self) -> Arc<Backend> {
        let index = self.rotation.next_index(self.backends.len());
        self.backends[index].clone()
    }

    /// Index the next `select` will return.
    pub fn cursor(&self) -> usize {
        self.rotation.position()
    }

    /// Return a list of all backends.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;

    fn registry(n: u16) -> BackendRegistry {
        let addrs = (0..n)
            .map(|i| BackendAddr::Stream {
                host: "127.0.0.1".into(),
                port: 3000 + i,
            })
            .collect();
        BackendRegistry::new(addrs).unwrap()
    }

    #[test]
    fn rejects_empty_backend_list() {
        assert_eq!(BackendRegistry::new(Vec::new()).unwrap_err(), EmptyRegistry);
    }

    #[test]
    fn selects_in_order_and_wraps() {
        let registry = registry(3);
        let picked: Vec<String> = (0..4).map(|_| registry.select().addr().to_string()).collect();
        assert_eq!(
            picked,
            vec!["127.0.0.1:3000", "127.0.0.1:3001", "127.0.0.1:3002", "127.0.0.1:3000"]
        );
        assert_eq!(registry.cursor(), 1);
    }

    #[test]
    fn single_backend_is_always_selected() {
        let registry = registry(1);
        for _ in 0..3 {
            assert_eq!(registry.select().addr().to_string(), "127.0.0.1:3000");
        }
        assert_eq!(registry.cursor(), 0);
    }

    #[test]
    fn concurrent_selection_is_fair() {
        const BACKENDS: u16 = 4;
        const THREADS: usize = 8;
        const CALLS_PER_THREAD: usize = 1_000;

        let registry = Arc::new(registry(BACKENDS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..CALLS_PER_THREAD)
                        .map(|_| registry.select().addr().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for addr in handle.join().unwrap() {
                *counts.entry(addr).or_default() += 1;
            }
        }

        let expected = THREADS * CALLS_PER_THREAD / BACKENDS as usize;
        assert_eq!(counts.len(), BACKENDS as usize);
        for (addr, count) in counts {
            assert_eq!(count, expected, "backend {} picked {} times", addr, count);
        }
        assert_eq!(registry.cursor(), 0);
    }
}
