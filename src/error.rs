//! Error taxonomy for the visualizer pipeline.
//!
//! Every failure maps onto one of three [`ErrorKind`]s: configuration problems
//! (bad capture size), lifecycle misuse (wrong state, use after release) and
//! transform failures (an FFT asked to run on an impossible frame).

use thiserror::Error;

use crate::pipeline::PipelineState;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Lifecycle,
    Transform,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisualizerError {
    #[error("capture size {size} must be a power of two and at least 2")]
    InvalidCaptureSize { size: usize },

    #[error("capture size {size} is outside the supported range [{min}, {max}]")]
    CaptureSizeOutOfRange { size: usize, min: usize, max: usize },

    #[error("invalid capture size range [{min}, {max}]")]
    InvalidRange { min: usize, max: usize },

    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    #[error("visualizer is not initialized")]
    NotInitialized,

    #[error("capture session failed: {0}")]
    Session(String),

    #[error("transform size {size} must be even and positive")]
    InvalidTransformSize { size: usize },

    #[error("frame of {actual} samples does not match transform size {expected}")]
    FrameLengthMismatch { expected: usize, actual: usize },
}

impl VisualizerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCaptureSize { .. }
            | Self::CaptureSizeOutOfRange { .. }
            | Self::InvalidRange { .. } => ErrorKind::Configuration,
            Self::InvalidState { .. } | Self::NotInitialized | Self::Session(_) => {
                ErrorKind::Lifecycle
            }
            Self::InvalidTransformSize { .. } | Self::FrameLengthMismatch { .. } => {
                ErrorKind::Transform
            }
        }
    }
}

pub type Result<T, E = VisualizerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            VisualizerError::InvalidCaptureSize { size: 3 }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(VisualizerError::NotInitialized.kind(), ErrorKind::Lifecycle);
        assert_eq!(
            VisualizerError::FrameLengthMismatch {
                expected: 8,
                actual: 4
            }
            .kind(),
            ErrorKind::Transform
        );
    }

    #[test]
    fn test_error_messages() {
        let err = VisualizerError::CaptureSizeOutOfRange {
            size: 4096,
            min: 128,
            max: 2048,
        };
        assert_eq!(
            err.to_string(),
            "capture size 4096 is outside the supported range [128, 2048]"
        );
    }
}
