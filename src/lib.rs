//! Live audio visualizer capture.
//!
//! Turns raw PCM buffers into two fixed-size signed 8-bit frames per
//! delivery: the time-domain waveform and a packed FFT spectrum, in the
//! byte layout of the platform audio visualizer.
//!
//! - [`audio`] - frame normalization and sample formats
//! - [`analysis`] - Hann window, split-packing FFT, quantization
//! - [`pipeline`] - lifecycle, subscriber slots and the dual-stream emitter
//! - [`io`] - cpal capture session

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;

pub use config::{CaptureSizeRange, PipelineConfig};
pub use error::{ErrorKind, VisualizerError};
pub use pipeline::{EncodedFrame, PipelineState, StreamKind, VisualizerPipeline};
