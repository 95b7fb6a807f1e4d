//! Forward-with-retry engine
//!
//! One tick pulls a burst, applies the stream's forwarding mode, and drives
//! the transmit/retry loop. Backpressure is expected under load; retries are
//! bounded in count so a single tick has bounded tail latency, at the cost
//! of deterministic, counted loss once the budget runs out.
//!
//! Each stream is owned by exactly one worker thread. The only suspension
//! point is the inter-retry delay, taken on the worker's own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use fwdpath_common::{FwdError, FwdResult, PortId, QueueId};
use serde::{Deserialize, Serialize};

use crate::mode::ForwardMode;
use crate::packet::Packet;
use crate::queue::{RxQueue, TxQueue};
use crate::registry::TxCallbackRegistry;
use crate::stats::{StreamStats, StreamStatsSnapshot};

/// Engine configuration.
///
/// The retry pair is engine-wide, shared by every stream; both values are
/// explicit here rather than baked-in policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Packets requested per receive burst
    pub burst_size: usize,
    /// Transmit attempts after the first, per tick
    pub tx_retries: u32,
    /// Pause between transmit attempts
    pub retry_delay: Duration,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            burst_size: 32,
            tx_retries: 64,
            retry_delay: Duration::from_micros(1),
        }
    }
}

/// One receive-queue-to-transmit-queue forwarding association.
pub struct Stream {
    rx_port: PortId,
    rx_queue: QueueId,
    tx_port: PortId,
    tx_queue: QueueId,
    stats: Arc<StreamStats>,
}

impl Stream {
    /// Associate a receive (port, queue) with a transmit (port, queue).
    pub fn new(rx_port: PortId, rx_queue: QueueId, tx_port: PortId, tx_queue: QueueId) -> Self {
        Self {
            rx_port,
            rx_queue,
            tx_port,
            tx_queue,
            stats: Arc::new(StreamStats::default()),
        }
    }

    /// Receive side identifiers
    pub fn rx(&self) -> (PortId, QueueId) {
        (self.rx_port, self.rx_queue)
    }

    /// Transmit side identifiers
    pub fn tx(&self) -> (PortId, QueueId) {
        (self.tx_port, self.tx_queue)
    }

    /// Shared handle to this stream's counters
    pub fn stats(&self) -> Arc<StreamStats> {
        self.stats.clone()
    }
}

/// Per-tick counter deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickDelta {
    /// Packets pulled this tick
    pub received: u64,
    /// Packets the transmit queue accepted this tick
    pub transmitted: u64,
    /// Packets freed unaccepted this tick
    pub dropped: u64,
}

impl TickDelta {
    /// Every received packet was either transmitted or dropped.
    pub fn conserved(&self) -> bool {
        self.transmitted + self.dropped == self.received
    }
}

/// A stream bound to its queues, mode and scratch burst.
pub struct StreamWorker {
    stream: Stream,
    rx: Box<dyn RxQueue>,
    tx: Box<dyn TxQueue>,
    mode: Box<dyn ForwardMode>,
    registry: Arc<TxCallbackRegistry>,
    config: ForwardConfig,
    /// Reused across ticks; empty between ticks
    burst: Vec<Packet>,
}

impl StreamWorker {
    /// Bind a stream to its queue endpoints.
    pub fn new(
        stream: Stream,
        rx: Box<dyn RxQueue>,
        tx: Box<dyn TxQueue>,
        mode: Box<dyn ForwardMode>,
        registry: Arc<TxCallbackRegistry>,
        config: ForwardConfig,
    ) -> Self {
        let burst = Vec::with_capacity(config.burst_size);
        Self {
            stream,
            rx,
            tx,
            mode,
            registry,
            config,
            burst,
        }
    }

    /// Run one tick: pull, transform, transmit with bounded retry, account.
    ///
    /// An empty pull is a normal no-op tick. A device error aborts the tick
    /// for this stream only; packets still held are freed and counted as
    /// dropped first, so `transmitted + dropped == received` on every exit.
    pub fn forward_once(&mut self) -> FwdResult<TickDelta> {
        let tick_start = Instant::now();
        debug_assert!(self.burst.is_empty());

        let nb_rx = match self.rx.pull(&mut self.burst, self.config.burst_size) {
            Ok(n) => n,
            Err(err) => {
                self.release_held();
                return Err(err);
            }
        };
        if nb_rx == 0 {
            return Ok(TickDelta::default());
        }
        self.stream.stats.record_rx(nb_rx as u64);

        self.mode.apply_burst(&mut self.burst);

        let (tx_port, tx_queue) = self.stream.tx();
        let mut transmitted = 0u64;
        let mut retries_left = self.config.tx_retries;
        let mut device_err = None;
        loop {
            self.registry.run(tx_port, tx_queue, &mut self.burst);
            match self.tx.push(&mut self.burst) {
                Ok(accepted) => {
                    transmitted += accepted as u64;
                    if self.burst.is_empty() || retries_left == 0 {
                        break;
                    }
                    retries_left -= 1;
                    self.stream.stats.record_retry();
                    if !self.config.retry_delay.is_zero() {
                        thread::sleep(self.config.retry_delay);
                    }
                }
                Err(err) => {
                    device_err = Some(err);
                    break;
                }
            }
        }

        let dropped = self.burst.len() as u64;
        self.burst.clear();

        self.stream.stats.record_tx(transmitted);
        if dropped > 0 {
            self.stream.stats.record_drop(dropped);
        }
        self.stream
            .stats
            .record_tick_nanos(tick_start.elapsed().as_nanos() as u64);

        if let Some(err) = device_err {
            return Err(err);
        }
        Ok(TickDelta {
            received: nb_rx as u64,
            transmitted,
            dropped,
        })
    }

    /// Poll loop: tick until `running` clears, backing off when idle.
    ///
    /// The stop flag is only observed between ticks; held buffers are
    /// released when the worker returns.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        let (rx_port, rx_queue) = self.stream.rx();
        tracing::debug!(%rx_port, %rx_queue, "stream worker starting");

        let backoff = Backoff::new();
        while running.load(Ordering::Relaxed) {
            match self.forward_once() {
                Ok(delta) if delta.received == 0 => backoff.snooze(),
                Ok(_) => backoff.reset(),
                Err(err) => {
                    tracing::error!(%rx_port, %rx_queue, %err, "tick aborted");
                    backoff.snooze();
                }
            }
        }

        tracing::debug!(%rx_port, %rx_queue, "stream worker stopped");
    }

    /// Free anything the burst still holds, keeping the counters honest.
    fn release_held(&mut self) {
        let held = self.burst.len() as u64;
        if held > 0 {
            self.stream.stats.record_rx(held);
            self.stream.stats.record_drop(held);
            self.burst.clear();
        }
    }

    /// This worker's stream.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }
}

struct WorkerHandle {
    thread: Option<thread::JoinHandle<()>>,
}

/// Owns the streams and their worker threads.
///
/// Streams are added while stopped; `start` spawns one named thread per
/// stream and `stop` asks them to finish their current tick and joins.
pub struct ForwardEngine {
    config: ForwardConfig,
    registry: Arc<TxCallbackRegistry>,
    running: Arc<AtomicBool>,
    pending: Vec<StreamWorker>,
    workers: Vec<WorkerHandle>,
    stream_stats: Vec<Arc<StreamStats>>,
}

impl ForwardEngine {
    /// Create an engine with its own callback registry.
    pub fn new(config: ForwardConfig) -> Self {
        Self {
            config,
            registry: Arc::new(TxCallbackRegistry::new()),
            running: Arc::new(AtomicBool::new(false)),
            pending: Vec::new(),
            workers: Vec::new(),
            stream_stats: Vec::new(),
        }
    }

    /// The registry consulted by every stream's transmit path.
    pub fn registry(&self) -> Arc<TxCallbackRegistry> {
        self.registry.clone()
    }

    /// Bind a stream to its queues and mode; returns its counters.
    pub fn add_stream(
        &mut self,
        stream: Stream,
        rx: Box<dyn RxQueue>,
        tx: Box<dyn TxQueue>,
        mode: Box<dyn ForwardMode>,
    ) -> Arc<StreamStats> {
        let stats = stream.stats();
        self.stream_stats.push(stats.clone());
        self.pending.push(StreamWorker::new(
            stream,
            rx,
            tx,
            mode,
            self.registry.clone(),
            self.config.clone(),
        ));
        stats
    }

    /// Spawn one worker thread per stream.
    pub fn start(&mut self) -> FwdResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(FwdError::AlreadyRunning);
        }
        self.running.store(true, Ordering::Release);

        for (idx, worker) in self.pending.drain(..).enumerate() {
            let running = self.running.clone();
            let handle = thread::Builder::new()
                .name(format!("fwd-worker-{}", idx))
                .spawn(move || worker.run(running))
                .map_err(|e| FwdError::SpawnFailed(e.to_string()))?;
            self.workers.push(WorkerHandle {
                thread: Some(handle),
            });
        }

        tracing::info!(streams = self.workers.len(), "forward engine started");
        Ok(())
    }

    /// Cooperative stop: workers observe the flag between ticks.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        for worker in &mut self.workers {
            if let Some(handle) = worker.thread.take() {
                let _ = handle.join();
            }
        }
        self.workers.clear();
        tracing::info!("forward engine stopped");
    }

    /// True while workers are polling.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Counters summed across all streams.
    pub fn totals(&self) -> StreamStatsSnapshot {
        self.stream_stats
            .iter()
            .map(|s| s.snapshot())
            .fold(StreamStatsSnapshot::default(), StreamStatsSnapshot::merged)
    }
}

impl Drop for ForwardEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
