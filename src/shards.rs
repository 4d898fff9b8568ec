//! Segment partitioning with halo extension
//!
//! Splits a signal of `n` samples into `workers` contiguous segments of equal
//! length `n / workers`. Each segment is extended by `max_shift` trailing
//! samples (the halo) so a worker can evaluate every shift without reading
//! another worker's data.
//!
//! When `n` is not a multiple of `workers` the trailing `n % workers` samples
//! are never assigned to any segment. This is reported through
//! [`Partition::truncated`] and logged, but deliberately not corrected.

use std::ops::Range;

use thiserror::Error;
use tracing::warn;

/// Errors that can occur while partitioning a signal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("signal length must be greater than 0")]
    EmptySignal,

    #[error("worker count must be greater than 0")]
    NoWorkers,

    #[error("signal of {signal_len} samples is too short for {workers} workers")]
    EmptySegment { signal_len: usize, workers: usize },

    #[error("worker {worker} out of range for {workers} workers")]
    WorkerOutOfRange { worker: usize, workers: usize },
}

/// Placement of one worker's segment inside the Signal+Halo buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBounds {
    /// Rank of the worker owning this segment
    pub worker: usize,

    /// Offset of the first sample, `worker * segment_len`
    pub start: usize,

    /// Number of samples the worker sums over
    pub len: usize,

    /// Trailing samples appended after the segment (the max shift)
    pub halo: usize,
}

impl SegmentBounds {
    /// Samples the worker owns, without halo
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// Samples shipped to the worker: segment followed by its halo
    pub fn buffer_range(&self) -> Range<usize> {
        self.start..self.start + self.buffer_len()
    }

    /// Length of the local buffer, `len + halo`
    pub fn buffer_len(&self) -> usize {
        self.len + self.halo
    }
}

/// Deterministic assignment of segments to workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    signal_len: usize,
    workers: usize,
    max_shift: usize,
    segment_len: usize,
}

impl Partition {
    /// Total number of samples in the signal, including any truncated tail
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    /// Number of workers, coordinator included
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of shifts each worker evaluates
    pub fn max_shift(&self) -> usize {
        self.max_shift
    }

    /// Samples per segment, `signal_len / workers`
    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Length of every worker's local buffer
    pub fn buffer_len(&self) -> usize {
        self.segment_len + self.max_shift
    }

    /// Samples that are actually assigned to some worker
    pub fn covered_len(&self) -> usize {
        self.segment_len * self.workers
    }

    /// Trailing samples that no worker sees
    pub fn truncated(&self) -> usize {
        self.signal_len - self.covered_len()
    }

    /// Bounds for a single worker
    pub fn segment(&self, worker: usize) -> Result<SegmentBounds, PartitionError> {
        if worker >= self.workers {
            return Err(PartitionError::WorkerOutOfRange {
                worker,
                workers: self.workers,
            });
        }
        Ok(self.bounds_unchecked(worker))
    }

    /// Iterate the bounds of all workers in rank order
    pub fn iter(&self) -> SegmentIter<'_> {
        SegmentIter {
            partition: self,
            next: 0,
        }
    }

    fn bounds_unchecked(&self, worker: usize) -> SegmentBounds {
        SegmentBounds {
            worker,
            start: worker * self.segment_len,
            len: self.segment_len,
            halo: self.max_shift,
        }
    }

    /// Verify that covered samples are assigned exactly once
    #[cfg(test)]
    fn verify_coverage(&self) -> bool {
        let mut seen = vec![false; self.signal_len];
        for bounds in self.iter() {
            for idx in bounds.range() {
                if idx >= self.signal_len || seen[idx] {
                    return false;
                }
                seen[idx] = true;
            }
        }
        seen[..self.covered_len()].iter().all(|&b| b)
            && seen[self.covered_len()..].iter().all(|&b| !b)
    }
}

impl<'a> IntoIterator for &'a Partition {
    type Item = SegmentBounds;
    type IntoIter = SegmentIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over segment bounds in rank order
pub struct SegmentIter<'a> {
    partition: &'a Partition,
    next: usize,
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = SegmentBounds;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.partition.workers {
            return None;
        }
        let bounds = self.partition.bounds_unchecked(self.next);
        self.next += 1;
        Some(bounds)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.partition.workers - self.next;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for SegmentIter<'a> {}

/// Partition a signal across workers
///
/// # Arguments
///
/// * `signal_len` - Number of samples in the signal (must be > 0)
/// * `workers` - Number of workers including the coordinator (must be > 0)
/// * `max_shift` - Number of shifts, which is also the halo length
///
/// # Example
///
/// ```
/// use shardcorr::partition;
///
/// let p = partition(1024, 4, 8).unwrap();
/// assert_eq!(p.segment_len(), 256);
/// assert_eq!(p.segment(3).unwrap().buffer_range(), 768..1032);
/// ```
pub fn partition(
    signal_len: usize,
    workers: usize,
    max_shift: usize,
) -> Result<Partition, PartitionError> {
    if signal_len == 0 {
        return Err(PartitionError::EmptySignal);
    }
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }

    let segment_len = signal_len / workers;
    if segment_len == 0 {
        return Err(PartitionError::EmptySegment {
            signal_len,
            workers,
        });
    }

    let partition = Partition {
        signal_len,
        workers,
        max_shift,
        segment_len,
    };

    if partition.truncated() > 0 {
        warn!(
            signal_len,
            workers,
            dropped = partition.truncated(),
            "signal length is not a multiple of the worker count; trailing samples are excluded"
        );
    }

    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        let p = partition(1024, 4, 8).unwrap();

        assert_eq!(p.segment_len(), 256);
        assert_eq!(p.buffer_len(), 264);
        assert_eq!(p.truncated(), 0);
        assert!(p.verify_coverage());

        let bounds: Vec<_> = p.iter().collect();
        assert_eq!(bounds.len(), 4);
        assert_eq!(bounds[0].range(), 0..256);
        assert_eq!(bounds[1].range(), 256..512);
        assert_eq!(bounds[3].buffer_range(), 768..1032);
    }

    #[test]
    fn test_remainder_is_dropped() {
        let p = partition(10, 3, 2).unwrap();

        assert_eq!(p.segment_len(), 3);
        assert_eq!(p.covered_len(), 9);
        assert_eq!(p.truncated(), 1);
        assert!(p.verify_coverage());
        assert_eq!(p.segment(2).unwrap().range(), 6..9);
    }

    #[test]
    fn test_single_worker_owns_everything() {
        let p = partition(16, 1, 4).unwrap();

        assert_eq!(p.segment(0).unwrap().buffer_range(), 0..20);
        assert!(p.verify_coverage());
    }

    #[test]
    fn test_error_cases() {
        assert_eq!(partition(0, 4, 8), Err(PartitionError::EmptySignal));
        assert_eq!(partition(16, 0, 8), Err(PartitionError::NoWorkers));
        assert_eq!(
            partition(3, 4, 8),
            Err(PartitionError::EmptySegment {
                signal_len: 3,
                workers: 4
            })
        );

        let p = partition(16, 2, 4).unwrap();
        assert!(matches!(
            p.segment(2),
            Err(PartitionError::WorkerOutOfRange { worker: 2, workers: 2 })
        ));
    }

    #[test]
    fn test_iterator_len() {
        let p = partition(100, 7, 3).unwrap();
        let mut iter = p.iter();
        assert_eq!(iter.len(), 7);
        iter.next();
        assert_eq!(iter.len(), 6);
    }

    proptest! {
        #[test]
        fn prop_segments_stay_inside_halo_buffer(
            n in 1usize..5000,
            w in 1usize..17,
            k in 0usize..64,
        ) {
            prop_assume!(n >= w);
            let p = partition(n, w, k).unwrap();

            prop_assert!(p.verify_coverage());
            prop_assert_eq!(p.truncated(), n % w);
            for bounds in &p {
                prop_assert!(bounds.buffer_range().end <= n + k);
            }
        }
    }
}
