//! Audio capture using cpal.
//!
//! [`AudioInput`] is the capture session behind a [`VisualizerPipeline`]: it
//! opens the input device when the pipeline starts and feeds the first
//! channel of every callback buffer into
//! [`VisualizerPipeline::deliver_samples`].

use std::sync::Weak;

use anyhow::{Context, Result, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, StreamConfig, SupportedBufferSize};
use tracing::{debug, error, info, trace, warn};

use crate::audio::{AudioSample, first_channel_into};
use crate::config::DEFAULT_CAPTURE_SIZE;
use crate::pipeline::{CaptureSession, VisualizerPipeline};

fn get_input_device() -> Result<Device> {
    cpal::default_host()
        .default_input_device()
        .context("No default input device available")
}

/// Asks the device for callbacks of `target` frames, within what it supports.
fn callback_buffer_size(supported: &SupportedBufferSize, target: u32) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max } => {
            let size = target.clamp(*min, *max);
            debug!("Using buffer size: {} (min={}, max={})", size, min, max);
            BufferSize::Fixed(size)
        }
        SupportedBufferSize::Unknown => {
            warn!("Supported buffer size range unknown, using default");
            BufferSize::Default
        }
    }
}

/// Captures audio from the default input device (microphone).
pub struct AudioInput {
    target: Weak<VisualizerPipeline>,
    stream: Option<cpal::Stream>,
}

impl AudioInput {
    /// Holds the pipeline weakly so the pipeline can own this session.
    pub fn new(target: Weak<VisualizerPipeline>) -> Self {
        Self {
            target,
            stream: None,
        }
    }

    /// `reserve` is the largest callback expected, so the audio thread never grows `mono`.
    fn build_stream<Sample>(
        &self,
        device: &Device,
        config: &StreamConfig,
        reserve: usize,
    ) -> Result<cpal::Stream>
    where
        Sample: AudioSample + cpal::SizedSample,
    {
        let channels = config.channels as usize;
        let target = self.target.clone();
        let mut mono: Vec<f32> = Vec::with_capacity(reserve);

        let stream = device.build_input_stream(
            config,
            move |data: &[Sample], _: &cpal::InputCallbackInfo| {
                let Some(pipeline) = target.upgrade() else {
                    return;
                };
                first_channel_into(data, channels, &mut mono);
                if let Err(e) = pipeline.deliver_samples(&mono) {
                    trace!("Capture buffer rejected: {}", e);
                }
            },
            |err| error!("An error occurred on the input audio stream: {}", err),
            None,
        )?;
        Ok(stream)
    }
}

impl CaptureSession for AudioInput {
    fn activate(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let input_device = get_input_device()?;
        let input_config = input_device.default_input_config()?;
        debug!("Input config: {input_config:#?}");

        let (capture_size, max_capture_size) = match self.target.upgrade() {
            Some(pipeline) => (
                pipeline.capture_size().unwrap_or(DEFAULT_CAPTURE_SIZE),
                pipeline.capture_size_range().max(),
            ),
            None => bail!("Visualizer pipeline is gone"),
        };

        let mut config = input_config.config();
        config.buffer_size =
            callback_buffer_size(input_config.buffer_size(), capture_size as u32);
        let reserve = match config.buffer_size {
            BufferSize::Fixed(frames) => (frames as usize).max(max_capture_size),
            BufferSize::Default => max_capture_size,
        };

        let stream = match input_config.sample_format() {
            SampleFormat::F32 => self.build_stream::<f32>(&input_device, &config, reserve)?,
            SampleFormat::I16 => self.build_stream::<i16>(&input_device, &config, reserve)?,
            SampleFormat::U16 => self.build_stream::<u16>(&input_device, &config, reserve)?,
            SampleFormat::I32 => self.build_stream::<i32>(&input_device, &config, reserve)?,
            SampleFormat::I8 => self.build_stream::<i8>(&input_device, &config, reserve)?,
            SampleFormat::U8 => self.build_stream::<u8>(&input_device, &config, reserve)?,
            format => bail!("Unsupported sample format: {:?}", format),
        };
        stream.play()?;
        info!("Microphone input enabled");
        self.stream = Some(stream);
        Ok(())
    }

    fn deactivate(&mut self) {
        if self.stream.take().is_some() {
            info!("Microphone input disabled");
        }
    }
}
