//! Hann analysis window.

use std::f64::consts::PI;

use crate::error::{Result, VisualizerError};

/// Hann coefficients for one frame size, `w[i] = 0.5 * (1 - cos(2πi / (N - 1)))`.
///
/// Only the first half is evaluated; the second half mirrors it so the window
/// is exactly symmetric and both endpoints are exactly zero.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    coefficients: Vec<f32>,
}

impl AnalysisWindow {
    pub fn hann(size: usize) -> Result<Self> {
        if size < 2 || size % 2 != 0 {
            return Err(VisualizerError::InvalidCaptureSize { size });
        }

        let denom = (size - 1) as f64;
        let mut coefficients = vec![0.0f32; size];
        for i in 0..size / 2 {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos());
            coefficients[i] = w as f32;
            coefficients[size - 1 - i] = w as f32;
        }
        coefficients[0] = 0.0;
        coefficients[size - 1] = 0.0;

        Ok(Self { coefficients })
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Writes `samples[i] * w[i]` into `out`. All three slices must have the window's length.
    pub fn apply(&self, samples: &[f32], out: &mut [f32]) {
        debug_assert_eq!(samples.len(), self.coefficients.len());
        debug_assert_eq!(out.len(), self.coefficients.len());
        for ((o, &s), &w) in out.iter_mut().zip(samples).zip(&self.coefficients) {
            *o = s * w;
        }
    }
}
