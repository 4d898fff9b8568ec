//! Elementwise reduction of per-worker shift sums

use thiserror::Error;

use crate::kernel::ShiftSums;

/// Errors raised while folding worker results
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    #[error("worker result has {actual} shifts, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Running elementwise sum of every worker's [`ShiftSums`]
///
/// Owned by the coordinator. Seeded from its own result, then folded in place
/// as the other workers report. Fold order only affects floating-point
/// rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSums {
    sums: Vec<f32>,
    reported: usize,
}

impl GlobalSums {
    /// Start from the coordinator's own partial sums
    pub fn seed(own: ShiftSums) -> Self {
        Self {
            sums: own,
            reported: 1,
        }
    }

    /// Fold one worker's partial sums into the total
    pub fn accumulate(&mut self, partial: &[f32]) -> Result<(), ReduceError> {
        if partial.len() != self.sums.len() {
            return Err(ReduceError::LengthMismatch {
                expected: self.sums.len(),
                actual: partial.len(),
            });
        }
        for (total, &value) in self.sums.iter_mut().zip(partial) {
            *total += value;
        }
        self.reported += 1;
        Ok(())
    }

    /// Number of workers folded so far, the seed included
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Number of shifts
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    /// Returns true if no shifts were computed
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.sums
    }

    /// Value at shift 0, the energy of the covered samples
    pub fn energy(&self) -> Option<f32> {
        self.sums.first().copied()
    }

    /// `(shift, value)` pairs for shifts `1..max_plot`, clamped to the shifts computed
    ///
    /// Shift 0 is skipped; it carries the signal energy, not periodicity.
    pub fn plot_rows(&self, max_plot: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let end = max_plot.min(self.sums.len());
        (1..end).map(move |s| (s, self.sums[s]))
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.sums
    }
}
