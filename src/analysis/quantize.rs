//! Amplitude quantization into the signed 8-bit visualizer format.
//!
//! Both streams use the same rule: `round(v * 127)` saturated to `[-128, 127]`.
//! The FFT stream is packed as
//!
//! ```text
//! [ re0, re1, ..., re(N/2-1), im1, im2, ..., im(N/2-1), 0 ]
//! ```
//!
//! The DC and Nyquist bins carry no imaginary part, so neither is written.
//! The last byte has no source value and is always zero.

use crate::analysis::fft::SpectralComponents;
use crate::error::{Result, VisualizerError};

pub const QUANTIZATION_SCALE: f32 = 127.0;

/// Maps one amplitude to a signed byte. NaN encodes as zero.
#[inline]
pub fn quantize(value: f32) -> i8 {
    (value * QUANTIZATION_SCALE).round().clamp(-128.0, 127.0) as i8
}

/// Quantizes a frame of samples, one byte per sample in input order.
pub fn encode_waveform(samples: &[f32]) -> Vec<i8> {
    samples.iter().map(|&s| quantize(s)).collect()
}

/// Packs spectral components into a `2 * bins` byte frame.
pub fn encode_fft(spectrum: &SpectralComponents) -> Result<Vec<i8>> {
    let bins = spectrum.bins();
    if bins == 0 || spectrum.imag.len() != bins {
        return Err(VisualizerError::FrameLengthMismatch {
            expected: bins,
            actual: spectrum.imag.len(),
        });
    }

    let mut out = vec![0i8; bins * 2];
    let (real_bytes, imag_bytes) = out.split_at_mut(bins);
    for (byte, &re) in real_bytes.iter_mut().zip(&spectrum.real) {
        *byte = quantize(re);
    }
    for (byte, &im) in imag_bytes.iter_mut().zip(&spectrum.imag[1..]) {
        *byte = quantize(im);
    }
    Ok(out)
}
