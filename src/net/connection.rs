//! Per-connection identity for TCP mode log spans.

use std::fmt;

/// Identifier carried by the span of one relayed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Id sequence for one accept loop, starting at `conn-1`.
#[derive(Debug, Default)]
pub struct ConnectionIds {
    issued: u64,
}

impl ConnectionIds {
    pub fn next_id(&mut self) -> ConnectionId {
        self.issued += 1;
        ConnectionId(self.issued)
    }
}
