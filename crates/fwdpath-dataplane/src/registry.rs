//! Transmit callback registry
//!
//! At most one callback per (port, queue). The transmit path reads the slot
//! with a single atomic handle load; register/deregister happen on the
//! control plane under a mutex and swap the handle atomically, so a worker
//! mid-burst either sees the old callback or the new one, never a torn slot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use fwdpath_common::{FwdError, FwdResult, PortId, QueueId};
use parking_lot::Mutex;

use crate::packet::Packet;
use crate::queue::DeviceCaps;

/// A transmit-time packet hook.
///
/// Invoked with the outbound batch immediately before the device sees it.
/// May mutate packets in place; must not change batch size or order.
pub struct TxCallback {
    f: Box<dyn Fn(PortId, QueueId, &mut [Packet]) + Send + Sync>,
}

impl TxCallback {
    /// Wrap a closure as a callback.
    pub fn new(f: impl Fn(PortId, QueueId, &mut [Packet]) + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }

    #[inline]
    fn invoke(&self, port: PortId, queue: QueueId, pkts: &mut [Packet]) {
        (self.f)(port, queue, pkts);
    }
}

/// Stamp a fixed metadata word on every outbound packet.
///
/// The canonical callback: writes `value` into each packet's metadata word
/// and raises the transmit-metadata flag.
pub fn metadata_stamper(value: u32) -> TxCallback {
    TxCallback::new(move |_port, _queue, pkts| {
        for pkt in pkts.iter_mut() {
            pkt.set_tx_metadata(value);
        }
    })
}

struct PortCallbacks {
    slots: Vec<ArcSwapOption<TxCallback>>,
}

impl PortCallbacks {
    fn new(queue_count: usize) -> Self {
        let mut slots = Vec::with_capacity(queue_count);
        for _ in 0..queue_count {
            slots.push(ArcSwapOption::empty());
        }
        Self { slots }
    }
}

/// Per-port, per-queue transmit callback table.
pub struct TxCallbackRegistry {
    ports: DashMap<PortId, Arc<PortCallbacks>>,
    /// Serializes register/deregister; the transmit path never takes it
    ctl: Mutex<()>,
}

impl TxCallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            ports: DashMap::new(),
            ctl: Mutex::new(()),
        }
    }

    /// Install a callback on (port, queue).
    ///
    /// Validates the identifiers against the device first; an occupied slot
    /// fails with `CallbackExists` and leaves the registry untouched.
    pub fn register(
        &self,
        caps: &dyn DeviceCaps,
        port: PortId,
        queue: QueueId,
        callback: TxCallback,
    ) -> FwdResult<()> {
        let queue_count = caps.queue_count(port)?;
        if queue.raw() >= queue_count {
            return Err(FwdError::InvalidQueue {
                port: port.raw(),
                queue: queue.raw(),
                queue_count,
            });
        }

        let _ctl = self.ctl.lock();
        let entry = self
            .ports
            .entry(port)
            .or_insert_with(|| Arc::new(PortCallbacks::new(queue_count as usize)))
            .clone();
        let slot = &entry.slots[queue.raw() as usize];
        if slot.load().is_some() {
            return Err(FwdError::CallbackExists {
                port: port.raw(),
                queue: queue.raw(),
            });
        }
        slot.store(Some(Arc::new(callback)));
        tracing::info!(%port, %queue, "tx callback registered");
        Ok(())
    }

    /// Remove the callback on (port, queue); a no-op when none is installed.
    pub fn deregister(&self, caps: &dyn DeviceCaps, port: PortId, queue: QueueId) -> FwdResult<()> {
        let queue_count = caps.queue_count(port)?;
        if queue.raw() >= queue_count {
            return Err(FwdError::InvalidQueue {
                port: port.raw(),
                queue: queue.raw(),
                queue_count,
            });
        }

        let _ctl = self.ctl.lock();
        if let Some(entry) = self.ports.get(&port) {
            let slot = &entry.slots[queue.raw() as usize];
            if slot.swap(None).is_some() {
                tracing::info!(%port, %queue, "tx callback removed");
            }
        }
        Ok(())
    }

    /// True when a callback is installed on (port, queue).
    pub fn is_registered(&self, port: PortId, queue: QueueId) -> bool {
        self.ports
            .get(&port)
            .map(|entry| {
                entry
                    .slots
                    .get(queue.raw() as usize)
                    .is_some_and(|slot| slot.load().is_some())
            })
            .unwrap_or(false)
    }

    /// Transmit-path hook: invoke the callback on the outbound batch.
    #[inline]
    pub fn run(&self, port: PortId, queue: QueueId, pkts: &mut [Packet]) {
        if pkts.is_empty() {
            return;
        }
        let Some(entry) = self.ports.get(&port) else {
            return;
        };
        let Some(slot) = entry.slots.get(queue.raw() as usize) else {
            return;
        };
        if let Some(cb) = slot.load_full() {
            cb.invoke(port, queue, pkts);
        }
    }
}

impl Default for TxCallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
