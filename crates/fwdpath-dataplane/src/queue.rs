//! Device queue abstractions
//!
//! The surrounding framework owns device bring-up and the packet allocator;
//! the engine only ever sees these traits. Pull and push never block: an
//! empty pull is the normal idle case and a short push is backpressure, not
//! an error.
//!
//! A loopback pair backed by a bounded ring is provided for tests and
//! benchmarks; its capacity limit produces genuine backpressure.

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use fwdpath_common::{FwdError, FwdResult, PortId};

use crate::packet::Packet;

/// Receive side of a device queue.
pub trait RxQueue: Send {
    /// Pull up to `max` packets, appending them to `out`.
    ///
    /// Returns how many were appended; zero is normal. A `FwdError::Device`
    /// is a device-level failure, not an empty queue.
    fn pull(&mut self, out: &mut Vec<Packet>, max: usize) -> FwdResult<usize>;
}

/// Transmit side of a device queue.
pub trait TxQueue: Send {
    /// Offer the whole batch; the queue accepts a prefix and drains those
    /// packets from the front of `pkts`, taking ownership.
    ///
    /// Returns how many were accepted (≤ `pkts.len()` on entry). Accepting
    /// fewer than offered is backpressure, not an error.
    fn push(&mut self, pkts: &mut Vec<Packet>) -> FwdResult<usize>;
}

/// Device capability queries consumed by control-plane operations.
pub trait DeviceCaps: Send + Sync {
    /// Number of configured transmit queues on `port`.
    ///
    /// `FwdError::InvalidPort` for ports the device does not have.
    fn queue_count(&self, port: PortId) -> FwdResult<u16>;
}

/// Transmit end of an in-process loopback queue pair.
pub struct LoopbackTx {
    tx: Sender<Packet>,
}

/// Receive end of an in-process loopback queue pair.
pub struct LoopbackRx {
    rx: Receiver<Packet>,
}

/// Create a bounded loopback queue pair.
///
/// Whatever is pushed on the transmit end comes back out of the receive
/// end; pushes beyond `capacity` in-flight packets are refused, which is
/// exactly the backpressure shape a bounded device ring has.
pub fn loopback(capacity: usize) -> (LoopbackTx, LoopbackRx) {
    let (tx, rx) = bounded(capacity);
    (LoopbackTx { tx }, LoopbackRx { rx })
}

impl TxQueue for LoopbackTx {
    fn push(&mut self, pkts: &mut Vec<Packet>) -> FwdResult<usize> {
        let mut accepted = 0;
        let mut offered = std::mem::take(pkts);
        let mut iter = offered.drain(..);
        while let Some(pkt) = iter.next() {
            match self.tx.try_send(pkt) {
                Ok(()) => accepted += 1,
                Err(TrySendError::Full(pkt)) => {
                    // Refused tail goes back to the caller, order intact
                    pkts.push(pkt);
                    pkts.extend(iter);
                    break;
                }
                Err(TrySendError::Disconnected(pkt)) => {
                    pkts.push(pkt);
                    pkts.extend(iter);
                    return Err(FwdError::Device("loopback peer disconnected".into()));
                }
            }
        }
        Ok(accepted)
    }
}

impl RxQueue for LoopbackRx {
    fn pull(&mut self, out: &mut Vec<Packet>, max: usize) -> FwdResult<usize> {
        let mut pulled = 0;
        while pulled < max {
            match self.rx.try_recv() {
                Ok(pkt) => {
                    out.push(pkt);
                    pulled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if pulled == 0 {
                        return Err(FwdError::Device("loopback peer disconnected".into()));
                    }
                    break;
                }
            }
        }
        Ok(pulled)
    }
}

/// Fixed queue layout for tests and single-device deployments.
pub struct StaticCaps {
    queues_per_port: Vec<u16>,
}

impl StaticCaps {
    /// One entry per port, each the port's transmit queue count.
    pub fn new(queues_per_port: Vec<u16>) -> Self {
        Self { queues_per_port }
    }
}

impl DeviceCaps for StaticCaps {
    fn queue_count(&self, port: PortId) -> FwdResult<u16> {
        self.queues_per_port
            .get(port.raw() as usize)
            .copied()
            .ok_or(FwdError::InvalidPort(port.raw()))
    }
}
