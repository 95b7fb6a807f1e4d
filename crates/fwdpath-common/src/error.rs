//! Error types for fwdpath

use thiserror::Error;

/// fwdpath error type
#[derive(Error, Debug)]
pub enum FwdError {
    /// Port identifier outside the device's configured range
    #[error("invalid port: {0}")]
    InvalidPort(u16),

    /// Queue identifier outside the port's configured range
    #[error("invalid queue {queue} for port {port} ({queue_count} queues)")]
    InvalidQueue {
        port: u16,
        queue: u16,
        queue_count: u16,
    },

    /// A transmit callback is already installed on this queue
    #[error("callback already registered on port {port} queue {queue}")]
    CallbackExists { port: u16, queue: u16 },

    /// Device-level queue failure (not backpressure)
    #[error("device error: {0}")]
    Device(String),

    /// Engine already running
    #[error("engine already running")]
    AlreadyRunning,

    /// Worker thread could not be spawned
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for fwdpath
pub type FwdResult<T> = Result<T, FwdError>;
