//! Stop signal shared between the signal handler and the running server.

use tokio::sync::broadcast;

/// One-shot stop signal fanned out to every running entry point.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for a server's `run` loop. Resolves once `trigger` fires.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every subscribed server to stop accepting.
    ///
    /// Returns how many servers were told; zero once they have all exited.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
