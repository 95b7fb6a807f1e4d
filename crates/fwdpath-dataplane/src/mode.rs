//! Forwarding modes
//!
//! A mode is the per-packet transform a stream applies between its receive
//! and transmit queues. Modes are object-safe so a worker can hold whichever
//! one it was configured with behind a `Box<dyn ForwardMode>`.

use tracing::warn;

use crate::packet::{Packet, RuntFrame};

/// Outcome of applying a mode to a whole burst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstOutcome {
    /// Packets the transform was applied to
    pub transformed: usize,
    /// Packets forwarded unmodified because the transform could not apply
    pub malformed: usize,
}

/// A per-packet header transform.
pub trait ForwardMode: Send + Sync {
    /// Apply the transform to one packet in place.
    ///
    /// A frame too short for the transform's header is an error; the packet
    /// must be left byte-for-byte untouched in that case.
    fn apply(&self, pkt: &mut Packet) -> Result<(), RuntFrame>;

    /// Mode name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Apply the transform to a burst.
    ///
    /// Malformed packets are logged and forwarded unmodified; they stay in
    /// the burst and are counted normally downstream.
    fn apply_burst(&self, pkts: &mut [Packet]) -> BurstOutcome {
        let mut outcome = BurstOutcome::default();
        for pkt in pkts {
            match self.apply(pkt) {
                Ok(()) => outcome.transformed += 1,
                Err(err) => {
                    outcome.malformed += 1;
                    warn!(mode = self.name(), %err, "forwarding packet unmodified");
                }
            }
        }
        outcome
    }
}

/// Exchange source and destination MAC addresses before forwarding.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacSwap;

impl ForwardMode for MacSwap {
    #[inline]
    fn apply(&self, pkt: &mut Packet) -> Result<(), RuntFrame> {
        pkt.swap_ether_addrs()
    }

    fn name(&self) -> &'static str {
        "macswap"
    }
}

/// Forward byte-for-byte, no header rewrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ForwardMode for Passthrough {
    #[inline]
    fn apply(&self, _pkt: &mut Packet) -> Result<(), RuntFrame> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "io"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MacAddr;
    use proptest::prelude::*;

    fn pkt(dst: [u8; 6], src: [u8; 6]) -> Packet {
        let mut frame = Vec::new();
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&[0x08, 0x00]);
        frame.extend_from_slice(&[0u8; 46]);
        Packet::from_frame(&frame[..])
    }

    #[test]
    fn test_macswap_exchanges_addrs() {
        let dst = [2, 0, 0, 0, 0, 1];
        let src = [2, 0, 0, 0, 0, 2];
        let mut p = pkt(dst, src);

        MacSwap.apply(&mut p).unwrap();
        assert_eq!(p.ether_dst().unwrap(), MacAddr::new(src));
        assert_eq!(p.ether_src().unwrap(), MacAddr::new(dst));
    }

    #[test]
    fn test_macswap_burst_counts_malformed() {
        let mut burst = vec![
            pkt([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2]),
            Packet::from_frame(&[0u8; 6][..]),
            pkt([2, 0, 0, 0, 0, 3], [2, 0, 0, 0, 0, 4]),
        ];

        let outcome = MacSwap.apply_burst(&mut burst);
        assert_eq!(outcome.transformed, 2);
        assert_eq!(outcome.malformed, 1);
        // Runt forwarded untouched, still in the burst
        assert_eq!(burst.len(), 3);
        assert_eq!(burst[1].data(), &[0u8; 6][..]);
    }

    #[test]
    fn test_passthrough_leaves_frame_alone() {
        let mut p = pkt([1; 6], [2; 6]);
        let before = p.data().to_vec();
        Passthrough.apply(&mut p).unwrap();
        assert_eq!(p.data(), &before[..]);
    }

    proptest! {
        #[test]
        fn macswap_twice_is_identity(frame in proptest::collection::vec(any::<u8>(), 14..128)) {
            let mut p = Packet::from_frame(&frame[..]);
            MacSwap.apply(&mut p).unwrap();
            MacSwap.apply(&mut p).unwrap();
            prop_assert_eq!(p.data(), &frame[..]);
        }
    }
}
