//! fwdpath burst forwarding data plane
//!
//! Poll-mode packet forwarding: each stream binds a receive (port, queue) to
//! a transmit (port, queue) and a worker drives it in a tight loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      FORWARD ENGINE                          │
//! │                                                              │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │  Worker 0    │   │  Worker 1    │   │  Worker N    │      │
//! │  │              │   │              │   │              │      │
//! │  │ RX pull      │   │ RX pull      │   │ RX pull      │      │
//! │  │   ▼          │   │   ▼          │   │   ▼          │      │
//! │  │ mode (swap)  │   │ mode (swap)  │   │ mode (swap)  │      │
//! │  │   ▼          │   │   ▼          │   │   ▼          │      │
//! │  │ tx callback ─┼───┼──────────────┼───┼─► registry   │      │
//! │  │   ▼          │   │   ▼          │   │   (shared)   │      │
//! │  │ TX push      │   │ TX push      │   │              │      │
//! │  │  + retry     │   │  + retry     │   │              │      │
//! │  └──────────────┘   └──────────────┘   └──────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - One worker owns one stream; packet buffers never cross workers
//! - `transmitted + dropped == received` after every tick, error paths
//!   included
//! - Retries are bounded in count, not elapsed time; exhaustion produces
//!   counted drops, not errors
//! - The callback registry is the only cross-stream shared state and is
//!   read with one atomic handle load on the transmit path

#![warn(missing_docs)]

pub mod classify;
pub mod dump;
pub mod engine;
pub mod mode;
pub mod packet;
pub mod registry;
pub mod stats;

pub mod queue;

pub use engine::{ForwardConfig, ForwardEngine, Stream, StreamWorker, TickDelta};
pub use mode::{ForwardMode, MacSwap, Passthrough};
pub use packet::{MacAddr, OffloadFlags, Packet};
pub use registry::{metadata_stamper, TxCallback, TxCallbackRegistry};

/// Default packets pulled per burst
pub const DEFAULT_BURST_SIZE: usize = 32;

/// Upper bound any queue implementation may assume for one burst
pub const MAX_BURST_SIZE: usize = 512;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_constants() {
        let config = ForwardConfig::default();
        assert_eq!(config.burst_size, DEFAULT_BURST_SIZE);
        assert!(config.burst_size <= MAX_BURST_SIZE);
    }
}
