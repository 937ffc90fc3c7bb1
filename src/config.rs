//! Configuration for the visualizer pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisualizerError};

pub const DEFAULT_CAPTURE_SIZE: usize = 1024;
pub const DEFAULT_SAMPLING_RATE: u32 = 48000;

/// Capture size bounds reported by the capture platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSizeRange {
    min: usize,
    max: usize,
}

impl CaptureSizeRange {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min > max || !is_valid_capture_size(min) || !is_valid_capture_size(max) {
            return Err(VisualizerError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, size: usize) -> bool {
        (self.min..=self.max).contains(&size)
    }
}

impl Default for CaptureSizeRange {
    fn default() -> Self {
        Self {
            min: 128,
            max: 2048,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub capture_size: usize,
    /// Informational only, forwarded with every emitted frame.
    pub sampling_rate_hint: u32,
    /// Drop deliveries that arrive faster than this rate. `None` processes every delivery.
    pub max_capture_rate_hz: Option<f32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_size: DEFAULT_CAPTURE_SIZE,
            sampling_rate_hint: DEFAULT_SAMPLING_RATE,
            max_capture_rate_hz: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self, range: &CaptureSizeRange) -> Result<()> {
        validate_capture_size(self.capture_size, range)
    }
}

pub fn is_valid_capture_size(size: usize) -> bool {
    size >= 2 && size.is_power_of_two()
}

pub fn validate_capture_size(size: usize, range: &CaptureSizeRange) -> Result<()> {
    if !is_valid_capture_size(size) {
        return Err(VisualizerError::InvalidCaptureSize { size });
    }
    if !range.contains(size) {
        return Err(VisualizerError::CaptureSizeOutOfRange {
            size,
            min: range.min(),
            max: range.max(),
        });
    }
    Ok(())
}
