//! Scatter and gather phases
//!
//! The coordinator ships every other worker its segment plus halo, then folds
//! the workers' partial sums into a [`GlobalSums`]. The coordinator's own
//! segment never touches a channel; it is fetched straight from the signal by
//! the caller.

use thiserror::Error;
use tracing::debug;

use crate::kernel::ShiftSums;
use crate::protocol::{Endpoint, MessageKind, TransferError};
use crate::reduce::{GlobalSums, ReduceError};
use crate::shards::Partition;
use crate::shared::{Signal, SignalError};

/// Errors raised while exchanging segments or results
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("result from rank {worker}: {source}")]
    Reduce { worker: usize, source: ReduceError },
}

/// Send each non-coordinator worker its segment plus halo
pub fn scatter(
    endpoint: &Endpoint,
    signal: &Signal,
    partition: &Partition,
) -> Result<(), ExchangeError> {
    for bounds in partition.iter().filter(|b| b.worker != endpoint.rank()) {
        let payload = signal.materialize_segment(&bounds)?;
        debug!(
            worker = bounds.worker,
            start = bounds.start,
            samples = payload.len(),
            "sending segment"
        );
        endpoint.send(bounds.worker, MessageKind::SegmentTransfer, payload)?;
    }
    Ok(())
}

/// Block until the coordinator's segment transfer arrives
pub fn receive_segment(endpoint: &Endpoint, coordinator: usize) -> Result<Vec<f32>, ExchangeError> {
    Ok(endpoint.recv(coordinator, MessageKind::SegmentTransfer)?)
}

/// Report a worker's partial sums to the coordinator
pub fn send_sums(
    endpoint: &Endpoint,
    coordinator: usize,
    sums: ShiftSums,
) -> Result<(), ExchangeError> {
    Ok(endpoint.send(coordinator, MessageKind::ResultTransfer, sums)?)
}

/// Seed the total with the coordinator's sums and fold in every other worker
///
/// Workers are received in rank order; each receive blocks until that
/// worker reports.
pub fn gather(
    endpoint: &Endpoint,
    partition: &Partition,
    own: ShiftSums,
) -> Result<GlobalSums, ExchangeError> {
    let mut total = GlobalSums::seed(own);
    for worker in (0..partition.workers()).filter(|&w| w != endpoint.rank()) {
        let partial = endpoint.recv(worker, MessageKind::ResultTransfer)?;
        total
            .accumulate(&partial)
            .map_err(|source| ExchangeError::Reduce { worker, source })?;
        debug!(worker, reported = total.reported(), "folded worker result");
    }
    Ok(total)
}
