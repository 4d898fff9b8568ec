//! Local autocorrelation kernel
//!
//! For a buffer holding one segment followed by its halo, computes
//! `sums[s] = Σ_{i < segment_len} buffer[i] * buffer[i + s]` for every shift
//! `s < max_shift`. The function is pure; it reads nothing but its inputs.

use thiserror::Error;

/// Per-shift partial sums produced by one worker
pub type ShiftSums = Vec<f32>;

/// Errors raised by the kernel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("buffer of {actual} samples is shorter than segment {segment_len} + halo {max_shift}")]
    BufferTooShort {
        actual: usize,
        segment_len: usize,
        max_shift: usize,
    },
}

/// Compute one sum of products per shift over a segment and its halo
///
/// Each shift accumulates in `f64` and is narrowed to `f32` once, which keeps
/// multi-million sample segments from drifting.
///
/// ```
/// use shardcorr::shift_sums;
///
/// let buffer = [1.0, 2.0, 3.0, 1.0];
/// let sums = shift_sums(&buffer, 3, 1).unwrap();
/// assert_eq!(sums, vec![14.0]);
/// ```
pub fn shift_sums(
    buffer: &[f32],
    segment_len: usize,
    max_shift: usize,
) -> Result<ShiftSums, KernelError> {
    if buffer.len() < segment_len + max_shift {
        return Err(KernelError::BufferTooShort {
            actual: buffer.len(),
            segment_len,
            max_shift,
        });
    }

    let segment = &buffer[..segment_len];
    let sums = (0..max_shift)
        .map(|s| {
            let shifted = &buffer[s..s + segment_len];
            segment
                .iter()
                .zip(shifted)
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum::<f64>() as f32
        })
        .collect();

    Ok(sums)
}
