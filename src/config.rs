//! Run configuration
//!
//! The defaults reproduce the classic benchmark setup: an 8M-sample signal,
//! 1024 shifts, the first 256 of which are written out for plotting.

use std::num::NonZeroUsize;
use std::thread;

use thiserror::Error;

/// Samples in the default input signal
pub const DEFAULT_SIGNAL_LEN: usize = 8 * 1024 * 1024;

/// Shifts computed by default
pub const DEFAULT_MAX_SHIFT: usize = 1024;

/// Shifts written to the plot file by default (a spreadsheet column limit)
pub const DEFAULT_MAX_PLOT: usize = 256;

/// Default input file
pub const DEFAULT_SIGNAL_FILE: &str = "bigsignal.bin";

/// Default output file
pub const DEFAULT_PLOT_FILE: &str = "plot.csv";

/// Errors in a [`RunConfig`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("max_plot ({max_plot}) must not exceed max_shift ({max_shift})")]
    PlotBeyondShifts { max_plot: usize, max_shift: usize },
}

/// Parameters fixed for the duration of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of samples in the signal
    pub signal_len: usize,

    /// Number of shifts to evaluate, also the halo length
    pub max_shift: usize,

    /// Shifts `1..max_plot` are emitted to the plot file
    pub max_plot: usize,

    /// Number of workers, coordinator included
    /// Default: available parallelism
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            signal_len: DEFAULT_SIGNAL_LEN,
            max_shift: DEFAULT_MAX_SHIFT,
            max_plot: DEFAULT_MAX_PLOT,
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl RunConfig {
    /// Create a configuration with the given worker count
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Set the signal length
    pub fn with_signal_len(mut self, signal_len: usize) -> Self {
        self.signal_len = signal_len;
        self
    }

    /// Set the number of shifts
    pub fn with_max_shift(mut self, max_shift: usize) -> Self {
        self.max_shift = max_shift;
        self
    }

    /// Set the number of shifts emitted
    pub fn with_max_plot(mut self, max_plot: usize) -> Self {
        self.max_plot = max_plot;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signal_len == 0 {
            return Err(ConfigError::Zero("signal_len"));
        }
        if self.max_shift == 0 {
            return Err(ConfigError::Zero("max_shift"));
        }
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.max_plot > self.max_shift {
            return Err(ConfigError::PlotBeyondShifts {
                max_plot: self.max_plot,
                max_shift: self.max_shift,
            });
        }
        Ok(())
    }
}
