//! Shared types for the fwdpath data plane.
//!
//! Device identifiers and the workspace-wide error taxonomy live here so the
//! data-plane crate and any control-plane consumer agree on both.

pub mod error;
pub mod ids;

pub use error::{FwdError, FwdResult};
pub use ids::{Direction, PortId, QueueId};
