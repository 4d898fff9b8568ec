//! Shardcorr: sharded autocorrelation across message-passing workers
//!
//! This crate splits a long signal into equal segments extended by a halo,
//! ships each segment to a worker rank over point-to-point channels, runs a
//! direct sum-of-products kernel on every rank and folds the per-shift
//! results back on the coordinator.

pub mod config;
pub mod coordinator;
pub mod exchange;
pub mod io;
pub mod kernel;
pub mod protocol;
pub mod reduce;
pub mod scatter_plan;
pub mod shards;
pub mod shared;

// Re-export main types at crate root
pub use config::{ConfigError, RunConfig};
pub use coordinator::{run, RunError, RunOutcome, COORDINATOR};
pub use kernel::{shift_sums, KernelError, ShiftSums};
pub use protocol::{mesh, Endpoint, MessageKind, TransferError};
pub use reduce::{GlobalSums, ReduceError};
pub use shards::{partition, Partition, PartitionError, SegmentBounds};
pub use shared::{Signal, SignalError, SignalView};
