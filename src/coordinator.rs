//! Run orchestration
//!
//! [`run`] starts one thread per worker rank, connected by a [`mesh`], and
//! drives rank 0 as the coordinator on the calling thread:
//!
//! 1. partition the signal and build the halo,
//! 2. start the timer and scatter segments,
//! 3. compute the coordinator's own shift sums from a borrowed view,
//! 4. gather and fold every worker's sums,
//! 5. stop the timer.
//!
//! Any failure on any rank aborts the run; there is no retry and no partial
//! result.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, debug_span, error};

use crate::config::{ConfigError, RunConfig};
use crate::exchange::{self, ExchangeError};
use crate::kernel::{shift_sums, KernelError};
use crate::protocol::{mesh, Endpoint, TransferError};
use crate::reduce::GlobalSums;
use crate::shards::{partition, Partition, PartitionError};
use crate::shared::{Signal, SignalDiagnostics, SignalError};

/// Rank of the coordinator
pub const COORDINATOR: usize = 0;

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("expected {expected} samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        source: std::io::Error,
    },

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("worker {worker} failed: {source}")]
    Worker {
        worker: usize,
        source: Box<RunError>,
    },
}

impl RunError {
    /// True when this error only reflects another rank going away
    fn is_disconnect(&self) -> bool {
        match self {
            RunError::Exchange(ExchangeError::Transfer(TransferError::Disconnected { .. })) => true,
            RunError::Worker { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub sums: GlobalSums,
    /// Wall time from the start of scatter to the last folded result
    pub elapsed: Duration,
    pub workers: usize,
    pub signal_len: usize,
    pub max_shift: usize,
}

impl RunOutcome {
    /// Millions of multiply-adds per second, `max_shift * signal_len / seconds / 1e6`
    pub fn throughput_mops(&self) -> f64 {
        let products = self.max_shift as f64 * self.signal_len as f64;
        products / self.elapsed.as_secs_f64() / 1_000_000.0
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:3} processors, {:10} elements, {:9.2} mega-autocorrelations computed per second",
            self.workers,
            self.signal_len,
            self.throughput_mops()
        )
    }
}

/// Compute the autocorrelation of `samples` across `config.workers` ranks
///
/// `samples` must hold exactly `config.signal_len` values.
pub fn run(samples: Vec<f32>, config: &RunConfig) -> Result<RunOutcome, RunError> {
    config.validate()?;
    if samples.len() != config.signal_len {
        return Err(RunError::SampleCount {
            expected: config.signal_len,
            actual: samples.len(),
        });
    }

    let partition = &partition(config.signal_len, config.workers, config.max_shift)?;
    let signal = Signal::with_halo(samples, config.max_shift)?;

    let mut endpoints = mesh(config.workers).into_iter();
    let Some(coordinator) = endpoints.next() else {
        return Err(PartitionError::NoWorkers.into());
    };

    let (coordinator_result, worker_results) = thread::scope(|scope| {
        let handles: Vec<_> = endpoints
            .map(|endpoint| {
                let worker = endpoint.rank();
                let handle = thread::Builder::new()
                    .name(format!("shardcorr-worker-{worker}"))
                    .spawn_scoped(scope, move || run_worker(endpoint, partition));
                (worker, handle)
            })
            .collect();

        let coordinator_result = run_coordinator(coordinator, &signal, partition);

        let worker_results: Vec<Result<(), RunError>> = handles
            .into_iter()
            .map(|(worker, handle)| match handle {
                Err(source) => Err(RunError::Spawn { worker, source }),
                Ok(handle) => match handle.join() {
                    Err(_) => Err(RunError::WorkerPanicked { worker }),
                    Ok(result) => result.map_err(|source| RunError::Worker {
                        worker,
                        source: Box::new(source),
                    }),
                },
            })
            .collect();

        (coordinator_result, worker_results)
    });

    let failures: Vec<RunError> = worker_results.into_iter().filter_map(Result::err).collect();
    let (sums, elapsed) = match coordinator_result {
        Ok(done) if failures.is_empty() => done,
        coordinator_result => {
            let mut errors: Vec<RunError> = coordinator_result.err().into_iter().collect();
            errors.extend(failures);
            for err in &errors {
                error!(error = %err, "run failed");
            }
            // A rank that only saw a peer vanish is a symptom; report the cause
            let pos = errors.iter().position(|e| !e.is_disconnect()).unwrap_or(0);
            return Err(errors.swap_remove(pos));
        }
    };

    Ok(RunOutcome {
        sums,
        elapsed,
        workers: partition.workers(),
        signal_len: partition.signal_len(),
        max_shift: partition.max_shift(),
    })
}

fn run_coordinator(
    endpoint: Endpoint,
    signal: &Signal,
    partition: &Partition,
) -> Result<(GlobalSums, Duration), RunError> {
    let span = debug_span!("coordinator", rank = endpoint.rank());
    let _enter = span.enter();

    let started = Instant::now();
    exchange::scatter(&endpoint, signal, partition)?;

    let own = signal.fetch_segment(&partition.segment(endpoint.rank())?)?;
    let own_sums = shift_sums(&own, partition.segment_len(), partition.max_shift())?;
    debug!("computed local shift sums");

    let total = exchange::gather(&endpoint, partition, own_sums)?;
    let elapsed = started.elapsed();

    let diagnostics = SignalDiagnostics::from(signal);
    debug!(
        fetches = diagnostics.fetch_count,
        copies = diagnostics.materialize_count,
        bytes = diagnostics.materialized_bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "reduction complete"
    );

    Ok((total, elapsed))
}

fn run_worker(endpoint: Endpoint, partition: &Partition) -> Result<(), RunError> {
    let span = debug_span!("worker", rank = endpoint.rank());
    let _enter = span.enter();

    let buffer = exchange::receive_segment(&endpoint, COORDINATOR)?;
    debug!(samples = buffer.len(), "received segment");

    let sums = shift_sums(&buffer, partition.segment_len(), partition.max_shift())?;
    exchange::send_sums(&endpoint, COORDINATOR, sums)?;
    debug!("sent shift sums");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(n: usize, w: usize, k: usize) -> RunConfig {
        RunConfig::with_workers(w)
            .with_signal_len(n)
            .with_max_shift(k)
            .with_max_plot(k)
    }

    #[test]
    fn test_constant_signal() {
        let outcome = run(vec![1.0; 1024], &config(1024, 4, 8)).unwrap();

        assert_eq!(outcome.sums.reported(), 4);
        assert!(outcome.sums.as_slice().iter().all(|&s| s == 1024.0));
    }

    #[test]
    fn test_single_worker_matches_direct_kernel() {
        let samples: Vec<f32> = (0..100).map(|i| ((i * 7) % 11) as f32 - 5.0).collect();
        let outcome = run(samples.clone(), &config(100, 1, 6)).unwrap();

        let signal = Signal::with_halo(samples, 6).unwrap();
        let direct = shift_sums(signal.as_slice(), 100, 6).unwrap();
        assert_eq!(outcome.sums.as_slice(), direct.as_slice());
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 * 0.37).sin()).collect();
        let reference = run(samples.clone(), &config(480, 1, 12)).unwrap();

        for workers in [2, 3, 4, 5, 8] {
            let outcome = run(samples.clone(), &config(480, workers, 12)).unwrap();
            for (a, b) in reference.sums.as_slice().iter().zip(outcome.sums.as_slice()) {
                assert!((a - b).abs() <= 1e-4 * a.abs().max(1.0), "{} workers: {} vs {}", workers, a, b);
            }
        }
    }

    #[test]
    fn test_truncated_tail_excluded_from_energy() {
        // 10 samples over 3 workers: the last sample never contributes to shift 0
        let mut samples = vec![1.0; 10];
        samples[9] = 100.0;
        let outcome = run(samples, &config(10, 3, 1)).unwrap();

        assert_eq!(outcome.sums.energy(), Some(9.0));
    }

    #[test]
    fn test_error_cases() {
        assert!(matches!(
            run(vec![1.0; 8], &config(16, 2, 2)),
            Err(RunError::SampleCount { expected: 16, actual: 8 })
        ));
        assert!(matches!(
            run(vec![1.0; 3], &config(3, 4, 2)),
            Err(RunError::Partition(PartitionError::EmptySegment { .. }))
        ));
        assert!(matches!(
            run(vec![1.0; 8], &config(8, 2, 2).with_max_plot(3)),
            Err(RunError::Config(ConfigError::PlotBeyondShifts { .. }))
        ));
    }

    #[test]
    fn test_outcome_display() {
        let outcome = RunOutcome {
            sums: GlobalSums::seed(vec![0.0; 4]),
            elapsed: Duration::from_secs(2),
            workers: 4,
            signal_len: 1_000_000,
            max_shift: 4,
        };

        assert_eq!(outcome.throughput_mops(), 2.0);
        assert_eq!(
            outcome.to_string(),
            "  4 processors,    1000000 elements,      2.00 mega-autocorrelations computed per second"
        );
    }

    #[test]
    fn test_disconnect_classification() {
        let disconnect = RunError::Exchange(ExchangeError::Transfer(TransferError::Disconnected {
            peer: 1,
            kind: crate::protocol::MessageKind::ResultTransfer,
        }));
        assert!(disconnect.is_disconnect());

        let wrapped = RunError::Worker {
            worker: 2,
            source: Box::new(disconnect),
        };
        assert!(wrapped.is_disconnect());
        assert!(!RunError::WorkerPanicked { worker: 1 }.is_disconnect());
    }
}
