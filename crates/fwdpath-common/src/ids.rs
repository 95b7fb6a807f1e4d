//! Device queue identifiers.

use serde::{Deserialize, Serialize};

/// Network interface port identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u16);

impl PortId {
    /// Create new port id
    #[inline(always)]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Raw id value
    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-port queue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(pub u16);

impl QueueId {
    /// Create new queue id
    #[inline(always)]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Raw id value
    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a stream a burst was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Burst just pulled from a receive queue
    Rx,
    /// Burst about to be handed to a transmit queue
    Tx,
}

impl Direction {
    /// Past-tense verb used in diagnostic output
    pub const fn verb(self) -> &'static str {
        match self {
            Direction::Rx => "received",
            Direction::Tx => "sent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(PortId::new(3).to_string(), "3");
        assert_eq!(QueueId::new(7).to_string(), "7");
    }

    #[test]
    fn test_direction_verb() {
        assert_eq!(Direction::Rx.verb(), "received");
        assert_eq!(Direction::Tx.verb(), "sent");
    }
}
