//! Signal files and plot output
//!
//! Signal files are raw `f32` samples in native byte order with no header.
//! Plot files hold one `"<shift> , <value>"` line per emitted shift.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::reduce::GlobalSums;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Errors reading or writing signal and plot files
#[derive(Error, Debug)]
pub enum IoError {
    #[error("cannot open data file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("data file {path} holds {available} samples, expected {expected}")]
    ShortSignal {
        path: PathBuf,
        expected: usize,
        available: usize,
    },

    #[error("cannot read data file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Read exactly `expected_len` samples from the start of `path`
///
/// Bytes past the first `expected_len` samples are ignored.
pub fn load_signal(path: impl AsRef<Path>, expected_len: usize) -> Result<Vec<f32>, IoError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut bytes = Vec::with_capacity(expected_len * SAMPLE_BYTES);
    file.take((expected_len * SAMPLE_BYTES) as u64)
        .read_to_end(&mut bytes)
        .map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if bytes.len() < expected_len * SAMPLE_BYTES {
        return Err(IoError::ShortSignal {
            path: path.to_path_buf(),
            expected: expected_len,
            available: bytes.len() / SAMPLE_BYTES,
        });
    }

    Ok(bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Write `samples` as raw native-endian `f32`
pub fn write_signal(path: impl AsRef<Path>, samples: &[f32]) -> Result<(), IoError> {
    let path = path.as_ref();
    let write_err = |source: io::Error| IoError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(write_err)?);
    for sample in samples {
        out.write_all(&sample.to_ne_bytes()).map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// Write shifts `1..max_plot` of `sums`, one `"<shift> , <value>"` line each
pub fn write_plot(path: impl AsRef<Path>, sums: &GlobalSums, max_plot: usize) -> Result<(), IoError> {
    let path = path.as_ref();
    let write_err = |source: io::Error| IoError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(write_err)?);
    for (shift, value) in sums.plot_rows(max_plot) {
        writeln!(out, "{:6} , {:10.2}", shift, value).map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// A sine wave of `len` samples repeating every `period` samples
pub fn sine_signal(len: usize, period: f32, amplitude: f32) -> Vec<f32> {
    let step = TAU / f64::from(period);
    (0..len)
        .map(|i| (f64::from(amplitude) * (step * i as f64).sin()) as f32)
        .collect()
}
