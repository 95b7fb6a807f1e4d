//! Stream statistics
//!
//! Lock-free counters owned by one worker and snapshot-readable from any
//! thread, so reporting never pauses the data path.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-stream counters (cache-line aligned, single writer).
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Packets pulled from the receive queue
    pub rx_packets: AtomicU64,
    /// Packets accepted by the transmit queue
    pub tx_packets: AtomicU64,
    /// Packets freed after the retry budget ran out
    pub dropped: AtomicU64,
    /// Transmit retry attempts
    pub tx_retries: AtomicU64,
    /// Nanoseconds spent inside ticks
    pub tick_nanos: AtomicU64,
}

impl StreamStats {
    #[inline(always)]
    pub fn record_rx(&self, packets: u64) {
        self.rx_packets.fetch_add(packets, Ordering::Relaxed);
        metrics::counter!("fwdpath_rx_packets").increment(packets);
    }

    #[inline(always)]
    pub fn record_tx(&self, packets: u64) {
        self.tx_packets.fetch_add(packets, Ordering::Relaxed);
        metrics::counter!("fwdpath_tx_packets").increment(packets);
    }

    #[inline(always)]
    pub fn record_drop(&self, packets: u64) {
        self.dropped.fetch_add(packets, Ordering::Relaxed);
        metrics::counter!("fwdpath_dropped_packets").increment(packets);
    }

    #[inline(always)]
    pub fn record_retry(&self) {
        self.tx_retries.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("fwdpath_tx_retries").increment(1);
    }

    #[inline(always)]
    pub fn record_tick_nanos(&self, nanos: u64) {
        self.tick_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy for reporting.
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            tx_retries: self.tx_retries.load(Ordering::Relaxed),
            tick_nanos: self.tick_nanos.load(Ordering::Relaxed),
        }
    }
}

/// Stats snapshot (non-atomic).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatsSnapshot {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub dropped: u64,
    pub tx_retries: u64,
    pub tick_nanos: u64,
}

impl StreamStatsSnapshot {
    /// Sum of two snapshots, for cross-stream totals.
    pub fn merged(self, other: Self) -> Self {
        Self {
            rx_packets: self.rx_packets + other.rx_packets,
            tx_packets: self.tx_packets + other.tx_packets,
            dropped: self.dropped + other.dropped,
            tx_retries: self.tx_retries + other.tx_retries,
            tick_nanos: self.tick_nanos + other.tick_nanos,
        }
    }

    /// Share of received packets that were dropped.
    pub fn drop_rate(&self) -> f64 {
        if self.rx_packets == 0 {
            return 0.0;
        }
        self.dropped as f64 / self.rx_packets as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = StreamStats::default();
        stats.record_rx(32);
        stats.record_tx(28);
        stats.record_drop(4);
        stats.record_retry();
        stats.record_retry();

        let snap = stats.snapshot();
        assert_eq!(snap.rx_packets, 32);
        assert_eq!(snap.tx_packets, 28);
        assert_eq!(snap.dropped, 4);
        assert_eq!(snap.tx_retries, 2);
        assert_eq!(snap.tx_packets + snap.dropped, snap.rx_packets);
    }

    #[test]
    fn test_merged_totals() {
        let a = StreamStats::default();
        let b = StreamStats::default();
        a.record_rx(10);
        b.record_rx(20);
        b.record_drop(5);

        let total = a.snapshot().merged(b.snapshot());
        assert_eq!(total.rx_packets, 30);
        assert_eq!(total.dropped, 5);
    }

    #[test]
    fn test_drop_rate() {
        let stats = StreamStats::default();
        assert_eq!(stats.snapshot().drop_rate(), 0.0);
        stats.record_rx(100);
        stats.record_drop(25);
        assert!((stats.snapshot().drop_rate() - 0.25).abs() < f64::EPSILON);
    }
}
