//! Real-input FFT via even/odd split packing.
//!
//! A real frame `x` of length `N` is packed into a complex sequence of length
//! `N/2` as `z[n] = x[2n] + i·x[2n+1]`, transformed with a half-length complex
//! FFT and then untangled into the first `N/2` bins of the real spectrum.
//!
//! Output follows the packed real-to-complex layout consumed by the encoder:
//! values are twice the mathematical DFT, `real[k]`/`imag[k]` hold bin `k` for
//! `k` in `1..N/2`, `real[0]` holds DC and `imag[0]` holds the (purely real)
//! Nyquist bin.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, VisualizerError};

/// Real and imaginary spectral components, `N/2` each.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralComponents {
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
}

impl SpectralComponents {
    pub fn zeroed(bins: usize) -> Self {
        Self {
            real: vec![0.0; bins],
            imag: vec![0.0; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.real.len()
    }
}

/// A planned forward transform for one frame size.
///
/// All buffers are allocated up front; [`SplitRealFft::process`] does not allocate.
pub struct SplitRealFft {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    packed: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    twiddles: Vec<Complex<f32>>,
}

impl SplitRealFft {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || size % 2 != 0 {
            return Err(VisualizerError::InvalidTransformSize { size });
        }
        let half = size / 2;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(half);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let twiddles = (0..half)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / size as f64;
                Complex::new(angle.cos() as f32, angle.sin() as f32)
            })
            .collect();

        Ok(Self {
            size,
            fft,
            packed: vec![Complex::new(0.0, 0.0); half],
            scratch,
            twiddles,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bins(&self) -> usize {
        self.size / 2
    }

    /// Transforms a windowed frame of exactly [`size`](Self::size) samples into `out`.
    pub fn process(&mut self, windowed: &[f32], out: &mut SpectralComponents) -> Result<()> {
        if windowed.len() != self.size {
            return Err(VisualizerError::FrameLengthMismatch {
                expected: self.size,
                actual: windowed.len(),
            });
        }
        let half = self.bins();
        if out.real.len() != half || out.imag.len() != half {
            return Err(VisualizerError::FrameLengthMismatch {
                expected: half,
                actual: out.real.len().min(out.imag.len()),
            });
        }

        for (z, pair) in self.packed.iter_mut().zip(windowed.chunks_exact(2)) {
            *z = Complex::new(pair[0], pair[1]);
        }

        self.fft
            .process_with_scratch(&mut self.packed, &mut self.scratch);

        // With Z = FFT(z): 2·E[k] = Z[k] + conj(Z[M-k]) is the spectrum of the
        // even samples, 2·O[k] = -i·(Z[k] - conj(Z[M-k])) that of the odd ones,
        // and 2·X[k] = 2·E[k] + W^k · 2·O[k].
        let minus_i = Complex::new(0.0f32, -1.0);
        for k in 0..half {
            let zk = self.packed[k];
            let zc = self.packed[(half - k) % half].conj();
            let even = zk + zc;
            let odd = (zk - zc) * minus_i;
            let x = even + self.twiddles[k] * odd;

            out.real[k] = x.re;
            if k == 0 {
                out.imag[0] = (even - odd).re;
            } else {
                out.imag[k] = x.im;
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for SplitRealFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitRealFft")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
