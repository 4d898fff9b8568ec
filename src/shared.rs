//! Signal storage with a cyclic halo and fetch/materialize access
//!
//! The coordinator owns the full signal. Its buffer is the signal followed by
//! a halo of `max_shift` samples that repeats the start of the signal, so that
//! `buffer[n + i] == samples[i % n]`. Worker segments are read out of this
//! buffer in one of two ways:
//!
//! - **`fetch_segment()`** - Returns a view that borrows from the signal. The
//!   coordinator uses this for its own segment, which never leaves the process.
//!
//! - **`materialize_segment()`** - Copies the segment and its halo into an
//!   owned vector. This is the payload of a segment transfer to another worker.
//!
//! # Example
//!
//! ```
//! use shardcorr::{partition, Signal};
//!
//! let signal = Signal::with_halo(vec![1.0, 2.0, 3.0, 4.0], 2).unwrap();
//! assert_eq!(signal.as_slice(), &[1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
//!
//! let p = partition(4, 2, 2).unwrap();
//! let last = p.segment(1).unwrap();
//! assert_eq!(signal.fetch_segment(&last).unwrap().as_slice(), &[3.0, 4.0, 1.0, 2.0]);
//! assert_eq!(signal.materialize_segment(&last).unwrap(), vec![3.0, 4.0, 1.0, 2.0]);
//! ```

use std::cell::Cell;
use std::ops::Deref;

use thiserror::Error;

use crate::shards::SegmentBounds;

/// Errors that can occur while building or reading a signal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal must contain at least one sample")]
    Empty,

    #[error("segment range {start}..{end} out of bounds for buffer length {len}")]
    SegmentOutOfBounds { start: usize, end: usize, len: usize },
}

/// Immutable signal plus halo, owned by the coordinator
///
/// The signal tracks access statistics for diagnostics:
/// - `fetch_count`: Number of borrowed segment views handed out
/// - `materialize_count`: Number of owned segment copies made
/// - `materialized_bytes`: Total bytes copied into segment payloads
#[derive(Debug)]
pub struct Signal {
    /// Samples followed by the halo
    data: Vec<f32>,

    /// Number of real samples, without halo
    len: usize,

    fetch_count: Cell<u64>,
    materialize_count: Cell<u64>,
    materialized_bytes: Cell<u64>,
}

impl Signal {
    /// Take ownership of `samples` and append a halo of `max_shift` samples
    ///
    /// The halo continues the signal cyclically, so it stays well defined
    /// even when `max_shift` exceeds the signal length.
    pub fn with_halo(mut samples: Vec<f32>, max_shift: usize) -> Result<Self, SignalError> {
        let len = samples.len();
        if len == 0 {
            return Err(SignalError::Empty);
        }

        samples.reserve_exact(max_shift);
        for i in 0..max_shift {
            let sample = samples[i % len];
            samples.push(sample);
        }

        Ok(Self {
            data: samples,
            len,
            fetch_count: Cell::new(0),
            materialize_count: Cell::new(0),
            materialized_bytes: Cell::new(0),
        })
    }

    /// Number of real samples, without halo
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; an empty signal cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the halo
    pub fn halo_len(&self) -> usize {
        self.data.len() - self.len
    }

    /// Signal followed by its halo
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Real samples only
    pub fn samples(&self) -> &[f32] {
        &self.data[..self.len]
    }

    /// Borrow a segment and its halo without copying
    pub fn fetch_segment(&self, bounds: &SegmentBounds) -> Result<SignalView<'_>, SignalError> {
        let slice = self.segment_slice(bounds)?;
        self.fetch_count.set(self.fetch_count.get() + 1);
        Ok(SignalView { data: slice })
    }

    /// Copy a segment and its halo into an owned buffer
    pub fn materialize_segment(&self, bounds: &SegmentBounds) -> Result<Vec<f32>, SignalError> {
        let slice = self.segment_slice(bounds)?;
        self.materialize_count.set(self.materialize_count.get() + 1);
        let bytes = std::mem::size_of_val(slice);
        self.materialized_bytes
            .set(self.materialized_bytes.get() + bytes as u64);
        Ok(slice.to_vec())
    }

    fn segment_slice(&self, bounds: &SegmentBounds) -> Result<&[f32], SignalError> {
        let range = bounds.buffer_range();
        if range.end > self.data.len() {
            return Err(SignalError::SegmentOutOfBounds {
                start: range.start,
                end: range.end,
                len: self.data.len(),
            });
        }
        Ok(&self.data[range])
    }

    /// Returns the number of fetch_segment() calls made
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.get()
    }

    /// Returns the number of materialize_segment() calls made
    pub fn materialize_count(&self) -> u64 {
        self.materialize_count.get()
    }

    /// Returns the total bytes materialized
    pub fn materialized_bytes(&self) -> u64 {
        self.materialized_bytes.get()
    }
}

/// A borrowed view of one segment plus halo
#[derive(Debug)]
pub struct SignalView<'a> {
    data: &'a [f32],
}

impl<'a> SignalView<'a> {
    /// Returns the data as a slice
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }
}

impl<'a> Deref for SignalView<'a> {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<'a> AsRef<[f32]> for SignalView<'a> {
    fn as_ref(&self) -> &[f32] {
        self.data
    }
}

/// Snapshot of a signal's access counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalDiagnostics {
    pub fetch_count: u64,
    pub materialize_count: u64,
    pub materialized_bytes: u64,
}

impl From<&Signal> for SignalDiagnostics {
    fn from(signal: &Signal) -> Self {
        Self {
            fetch_count: signal.fetch_count(),
            materialize_count: signal.materialize_count(),
            materialized_bytes: signal.materialized_bytes(),
        }
    }
}
