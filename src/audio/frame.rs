//! Fixed-size analysis frames.
//!
//! The capture side delivers buffers of whatever length the device chose.
//! [`FrameBuffer`] turns each of them into exactly `capture_size` samples:
//! the prefix of the delivered buffer when it is too long, zero-padded at the
//! tail when it is too short. Mismatches are never an error.

use crate::error::{Result, VisualizerError};

/// One normalized block of samples, exactly `capture_size` long.
///
/// Borrowed from the [`FrameBuffer`] that produced it; read-only downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame<'a> {
    samples: &'a [f32],
}

impl<'a> AudioFrame<'a> {
    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Owns the reusable frame storage for one capture size.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    samples: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(capture_size: usize) -> Result<Self> {
        if capture_size == 0 {
            return Err(VisualizerError::InvalidCaptureSize { size: capture_size });
        }
        Ok(Self {
            samples: vec![0.0; capture_size],
        })
    }

    pub fn capture_size(&self) -> usize {
        self.samples.len()
    }

    /// Truncates or zero-pads `raw` into the internal frame and returns a view of it.
    pub fn load(&mut self, raw: &[f32]) -> AudioFrame<'_> {
        let n = self.samples.len();
        let copied = raw.len().min(n);
        self.samples[..copied].copy_from_slice(&raw[..copied]);
        self.samples[copied..].fill(0.0);
        AudioFrame {
            samples: &self.samples,
        }
    }
}

/// Stateless form of [`FrameBuffer::load`].
pub fn normalize_frame(raw: &[f32], capture_size: usize) -> Vec<f32> {
    let mut frame: Vec<f32> = raw.iter().copied().take(capture_size).collect();
    frame.resize(capture_size, 0.0);
    frame
}
