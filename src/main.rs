use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use audify::io::AudioInput;
use audify::pipeline::{EncodedFrame, SinkWorker, StreamKind, VisualizerPipeline};
use audify::{CaptureSizeRange, PipelineConfig};

/// Capture the default microphone and log visualizer frames.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON file with a pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples per frame (power of two)
    #[arg(long)]
    capture_size: Option<usize>,

    /// Maximum frames per second
    #[arg(long)]
    rate: Option<f32>,

    /// Sampling rate reported alongside each frame
    #[arg(long)]
    sampling_rate: Option<u32>,

    /// How long to capture for
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(capture_size) = args.capture_size {
        config.capture_size = capture_size;
    }
    if let Some(rate) = args.rate {
        config.max_capture_rate_hz = Some(rate);
    }
    if let Some(sampling_rate) = args.sampling_rate {
        config.sampling_rate_hint = sampling_rate;
    }
    Ok(config)
}

fn log_waveform(frame: EncodedFrame) {
    let peak = frame.data().iter().map(|b| b.unsigned_abs()).max().unwrap_or(0);
    debug!("waveform #{} peak {}", frame.sequence, peak);
}

fn log_fft(frame: EncodedFrame) {
    let bins = frame.len() / 2;
    let loudest = frame.data()[1..bins]
        .iter()
        .enumerate()
        .max_by_key(|(_, b)| b.unsigned_abs())
        .map(|(i, _)| i + 1)
        .unwrap_or(0);
    debug!(
        "fft #{} dc {} loudest bin {} (~{} Hz)",
        frame.sequence,
        frame.data()[0],
        loudest,
        loudest as u64 * frame.sampling_rate as u64 / frame.len().max(1) as u64
    );
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    if let Err(e) = run(Args::parse()) {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    info!("Starting visualizer with config {:?}", config);

    let pipeline = Arc::new(VisualizerPipeline::new(CaptureSizeRange::default()));
    pipeline.apply_config(config)?;
    pipeline.attach_session(Box::new(AudioInput::new(Arc::downgrade(&pipeline))))?;

    let (waveform_sink, waveform_worker) = SinkWorker::spawn("waveform", 8, log_waveform);
    let (fft_sink, fft_worker) = SinkWorker::spawn("fft", 8, log_fft);
    pipeline.subscribe(StreamKind::Waveform, waveform_sink)?;
    pipeline.subscribe(StreamKind::Fft, fft_sink)?;

    pipeline.start()?;
    std::thread::sleep(Duration::from_secs(args.seconds));
    pipeline.stop()?;

    let stats = pipeline.stats();
    info!(
        "Processed {} frames, dropped {}, emitted {} waveform / {} fft",
        stats.frames_processed, stats.frames_dropped, stats.waveform_emitted, stats.fft_emitted
    );

    // Release drops the sinks, which lets the workers drain and exit.
    pipeline.release();
    waveform_worker.join();
    fft_worker.join();
    Ok(())
}
