//! Spectral and waveform analysis.
//!
//! - [`window`] - Hann analysis window
//! - [`fft`] - Split-packing real FFT
//! - [`quantize`] - Signed 8-bit visualizer encoding
//! - [`analyzer`] - Per-capture-size bundle of the above

pub mod analyzer;
pub mod fft;
pub mod quantize;
pub mod window;

pub use analyzer::{AnalyzedFrame, Analyzer};
pub use fft::{SpectralComponents, SplitRealFft};
pub use quantize::{encode_fft, encode_waveform, quantize};
pub use window::AnalysisWindow;
