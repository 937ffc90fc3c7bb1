//! Per-capture-size transform resources.

use tracing::debug;

use crate::analysis::fft::{SpectralComponents, SplitRealFft};
use crate::analysis::quantize::{encode_fft, encode_waveform};
use crate::analysis::window::AnalysisWindow;
use crate::audio::FrameBuffer;
use crate::error::Result;

/// Waveform and FFT bytes derived from the same source frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedFrame {
    pub waveform: Vec<i8>,
    pub fft: Vec<i8>,
}

/// Everything sized by `capture_size`: frame storage, window, FFT plan and scratch.
///
/// Built once per configuration and dropped as a unit when the size changes or
/// the pipeline is released.
#[derive(Debug)]
pub struct Analyzer {
    frame: FrameBuffer,
    window: AnalysisWindow,
    windowed: Vec<f32>,
    fft: SplitRealFft,
    spectrum: SpectralComponents,
}

impl Analyzer {
    pub fn new(capture_size: usize) -> Result<Self> {
        let window = AnalysisWindow::hann(capture_size)?;
        let fft = SplitRealFft::new(capture_size)?;
        debug!("Built analyzer for capture size {}", capture_size);
        Ok(Self {
            frame: FrameBuffer::new(capture_size)?,
            window,
            windowed: vec![0.0; capture_size],
            spectrum: SpectralComponents::zeroed(fft.bins()),
            fft,
        })
    }

    pub fn capture_size(&self) -> usize {
        self.frame.capture_size()
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    /// Runs one delivery through normalization, windowing, FFT and quantization.
    pub fn analyze(&mut self, raw: &[f32]) -> Result<AnalyzedFrame> {
        let frame = self.frame.load(raw);
        let waveform = encode_waveform(frame.samples());

        self.window.apply(frame.samples(), &mut self.windowed);
        self.fft.process(&self.windowed, &mut self.spectrum)?;
        let fft = encode_fft(&self.spectrum)?;

        Ok(AnalyzedFrame { waveform, fft })
    }
}
