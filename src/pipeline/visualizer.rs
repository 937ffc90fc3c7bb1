//! The visualizer pipeline and its lifecycle.
//!
//! ```text
//! Uninitialized --configure--> Configured --start--> Capturing
//!                                  ^                     |
//!                                  +-------stop----------+
//!         any state --release--> Released (terminal)
//! ```
//!
//! [`VisualizerPipeline::deliver_samples`] runs one full pass (normalize,
//! window, FFT, quantize, emit) on the calling thread.
//!
//! Locking:
//! - `frame` guards the per-size [`Analyzer`], config and sequence. A
//!   `configure` from another thread swaps the analyzer between two frames,
//!   never during one.
//! - `state` is the lifecycle state. Never held while a sink runs.
//! - `emit_gate` is read-held for a whole delivery. `stop` and `release`
//!   take it for writing once to wait out a frame that is still in flight.
//!
//! When nested, `frame` is always taken before `state`. Sinks run with only
//! the gate held, so a sink may call back into the pipeline.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::config::{CaptureSizeRange, PipelineConfig, validate_capture_size};
use crate::error::{Result, VisualizerError};

use super::dyn_traits::Pushable;
use super::emitter::DualStreamEmitter;
use super::frame::{EncodedFrame, StreamKind};
use super::session::CaptureSession;
use super::throttle::RateLimiter;

thread_local! {
    /// Address of the pipeline whose sinks are running on this thread, or 0.
    static EMITTING: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as running sinks of one pipeline until dropped.
struct EmitScope {
    previous: usize,
}

impl EmitScope {
    fn enter(pipeline: usize) -> Self {
        Self {
            previous: EMITTING.with(|current| current.replace(pipeline)),
        }
    }
}

impl Drop for EmitScope {
    fn drop(&mut self) {
        EMITTING.with(|current| current.set(self.previous));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Configured,
    Capturing,
    Released,
}

/// Counter snapshot returned by [`VisualizerPipeline::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub waveform_emitted: u64,
    pub fft_emitted: u64,
}

#[derive(Default)]
struct Counters {
    frames_processed: AtomicU64,
    frames_dropped: AtomicU64,
    waveform_emitted: AtomicU64,
    fft_emitted: AtomicU64,
}

struct FrameState {
    config: PipelineConfig,
    analyzer: Option<Analyzer>,
    limiter: RateLimiter,
    sequence: u64,
}

pub struct VisualizerPipeline {
    range: CaptureSizeRange,
    state: Mutex<PipelineState>,
    frame: Mutex<FrameState>,
    emit_gate: RwLock<()>,
    session: Mutex<Option<Box<dyn CaptureSession>>>,
    emitter: DualStreamEmitter,
    counters: Counters,
}

impl VisualizerPipeline {
    pub fn new(range: CaptureSizeRange) -> Self {
        let config = PipelineConfig::default();
        Self {
            range,
            state: Mutex::new(PipelineState::Uninitialized),
            frame: Mutex::new(FrameState {
                limiter: RateLimiter::new(config.max_capture_rate_hz),
                config,
                analyzer: None,
                sequence: 0,
            }),
            emit_gate: RwLock::new(()),
            session: Mutex::new(None),
            emitter: DualStreamEmitter::new(),
            counters: Counters::default(),
        }
    }

    pub fn capture_size_range(&self) -> CaptureSizeRange {
        self.range
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    pub fn config(&self) -> PipelineConfig {
        lock(&self.frame).config.clone()
    }

    /// The active capture size, once configured.
    pub fn capture_size(&self) -> Option<usize> {
        lock(&self.frame).analyzer.as_ref().map(Analyzer::capture_size)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.state() == PipelineState::Released {
            return Err(VisualizerError::NotInitialized);
        }
        Ok(())
    }

    fn address(&self) -> usize {
        self as *const Self as usize
    }

    fn is_emitting(&self) -> bool {
        EMITTING.with(|current| current.get()) == self.address()
    }

    /// `None` when called from one of this pipeline's own sinks, which
    /// already run inside the gate.
    fn enter_emit_gate(&self) -> Option<RwLockReadGuard<'_, ()>> {
        if self.is_emitting() {
            return None;
        }
        Some(self.emit_gate.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Blocks until no delivery is in flight on another thread.
    fn wait_for_emission(&self) {
        if self.is_emitting() {
            return;
        }
        drop(self.emit_gate.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Installs the session activated by [`start`](Self::start).
    pub fn attach_session(&self, session: Box<dyn CaptureSession>) -> Result<()> {
        self.ensure_alive()?;
        let previous = lock(&self.session).replace(session);
        if previous.is_some() {
            debug!("Replaced capture session");
        }
        Ok(())
    }

    /// Sets the capture size, keeping the rest of the configuration.
    pub fn configure(&self, capture_size: usize) -> Result<()> {
        self.reconfigure(|config| config.capture_size = capture_size)
    }

    /// Validates and applies a full configuration.
    ///
    /// Allowed while capturing; the next delivered frame uses the new size.
    pub fn apply_config(&self, config: PipelineConfig) -> Result<()> {
        self.reconfigure(|current| *current = config.clone())
    }

    /// Applies `edit` to the current config under the frame lock.
    ///
    /// The analyzer is built ahead of time so the audio thread usually only
    /// waits for the swap. `edit` runs again under the lock, and the analyzer
    /// is rebuilt there if another reconfigure won the race.
    fn reconfigure(&self, edit: impl Fn(&mut PipelineConfig)) -> Result<()> {
        self.ensure_alive()?;

        let (planned, active_size) = {
            let frame = lock(&self.frame);
            let mut config = frame.config.clone();
            edit(&mut config);
            (config, frame.analyzer.as_ref().map(Analyzer::capture_size))
        };
        planned.validate(&self.range)?;
        let mut prepared = if active_size == Some(planned.capture_size) {
            None
        } else {
            Some(Analyzer::new(planned.capture_size)?)
        };

        let (previous_size, applied) = {
            let mut frame = lock(&self.frame);
            let mut state = lock(&self.state);
            if *state == PipelineState::Released {
                return Err(VisualizerError::NotInitialized);
            }

            let mut config = frame.config.clone();
            edit(&mut config);
            config.validate(&self.range)?;

            let previous_size = frame.analyzer.as_ref().map(Analyzer::capture_size);
            if previous_size != Some(config.capture_size) {
                let analyzer = match prepared.take() {
                    Some(analyzer) if analyzer.capture_size() == config.capture_size => analyzer,
                    _ => Analyzer::new(config.capture_size)?,
                };
                frame.analyzer = Some(analyzer);
            }
            frame.limiter = RateLimiter::new(config.max_capture_rate_hz);
            frame.config = config.clone();
            if *state == PipelineState::Uninitialized {
                *state = PipelineState::Configured;
            }
            (previous_size, config)
        };

        match previous_size {
            Some(old) if old != applied.capture_size => info!(
                "Capture size changed from {} to {}",
                old, applied.capture_size
            ),
            _ => debug!("Pipeline configured: {:?}", applied),
        }
        Ok(())
    }

    /// Checks that `capture_size` would be accepted by [`configure`](Self::configure).
    pub fn validate_capture_size(&self, capture_size: usize) -> Result<()> {
        validate_capture_size(capture_size, &self.range)
    }

    pub fn start(&self) -> Result<()> {
        match self.state() {
            state @ PipelineState::Uninitialized => {
                return Err(VisualizerError::InvalidState {
                    operation: "start",
                    state,
                });
            }
            PipelineState::Released => return Err(VisualizerError::NotInitialized),
            PipelineState::Capturing => return Ok(()),
            PipelineState::Configured => {}
        }

        if let Some(session) = lock(&self.session).as_mut() {
            session
                .activate()
                .map_err(|e| VisualizerError::Session(format!("{e:#}")))?;
        }

        {
            let mut state = lock(&self.state);
            match *state {
                PipelineState::Configured => *state = PipelineState::Capturing,
                PipelineState::Capturing => return Ok(()),
                other => {
                    drop(state);
                    self.deactivate_session();
                    return Err(match other {
                        PipelineState::Released => VisualizerError::NotInitialized,
                        _ => VisualizerError::InvalidState {
                            operation: "start",
                            state: other,
                        },
                    });
                }
            }
        }

        lock(&self.frame).limiter.reset();
        info!("Capture started");
        Ok(())
    }

    /// Stops capturing. Once this returns, no further frame reaches a sink.
    pub fn stop(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            match *state {
                PipelineState::Uninitialized => {
                    return Err(VisualizerError::InvalidState {
                        operation: "stop",
                        state: *state,
                    });
                }
                PipelineState::Released => return Err(VisualizerError::NotInitialized),
                PipelineState::Configured => return Ok(()),
                PipelineState::Capturing => *state = PipelineState::Configured,
            }
        }

        self.wait_for_emission();
        self.deactivate_session();
        info!("Capture stopped");
        Ok(())
    }

    /// Releases the session, transform resources and subscribers. Idempotent
    /// and never panics, even after a sink panicked mid-frame.
    pub fn release(&self) {
        let (was_capturing, analyzer) = {
            let mut frame = lock(&self.frame);
            let mut state = lock(&self.state);
            if *state == PipelineState::Released {
                return;
            }
            let was_capturing = *state == PipelineState::Capturing;
            *state = PipelineState::Released;
            (was_capturing, frame.analyzer.take())
        };
        drop(analyzer);

        self.wait_for_emission();
        if was_capturing {
            self.deactivate_session();
        }
        lock(&self.session).take();
        self.emitter.clear();
        info!("Visualizer released");
    }

    fn deactivate_session(&self) {
        if let Some(session) = lock(&self.session).as_mut() {
            session.deactivate();
        }
    }

    pub fn subscribe(&self, kind: StreamKind, sink: Arc<dyn Pushable<EncodedFrame>>) -> Result<()> {
        self.ensure_alive()?;
        self.emitter.subscribe(kind, sink);
        // Lost a race with release, which may already have cleared the slots.
        if self.state() == PipelineState::Released {
            self.emitter.unsubscribe(kind);
            return Err(VisualizerError::NotInitialized);
        }
        debug!("Subscribed to {} stream", kind.name());
        Ok(())
    }

    pub fn unsubscribe(&self, kind: StreamKind) -> Result<()> {
        self.ensure_alive()?;
        if self.emitter.unsubscribe(kind) {
            debug!("Unsubscribed from {} stream", kind.name());
        }
        Ok(())
    }

    pub fn is_subscribed(&self, kind: StreamKind) -> bool {
        self.emitter.is_subscribed(kind)
    }

    /// Processes one buffer from the capture side.
    ///
    /// Outside of `Capturing` the buffer is discarded. Per-frame processing
    /// failures drop the frame and are never returned; the only error is use
    /// after [`release`](Self::release).
    pub fn deliver_samples(&self, samples: &[f32]) -> Result<()> {
        let _gate = self.enter_emit_gate();
        match self.state() {
            PipelineState::Released => return Err(VisualizerError::NotInitialized),
            PipelineState::Capturing => {}
            PipelineState::Uninitialized | PipelineState::Configured => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        let (analyzed, sequence, sampling_rate) = {
            let mut frame = lock(&self.frame);
            if !frame.limiter.allow() {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }

            let Some(analyzer) = frame.analyzer.as_mut() else {
                warn!("Capturing without an analyzer, dropping frame");
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            };
            let analyzed = match analyzer.analyze(samples) {
                Ok(analyzed) => analyzed,
                Err(e) => {
                    warn!("Dropping frame: {}", e);
                    self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
            };

            let sequence = frame.sequence;
            frame.sequence += 1;
            (analyzed, sequence, frame.config.sampling_rate_hint)
        };

        let outcome = {
            let _scope = EmitScope::enter(self.address());
            self.emitter.emit(analyzed, sequence, sampling_rate)
        };

        self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);
        if outcome.waveform {
            self.counters.waveform_emitted.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.fft {
            self.counters.fft_emitted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_processed: self.counters.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
            waveform_emitted: self.counters.waveform_emitted.load(Ordering::Relaxed),
            fft_emitted: self.counters.fft_emitted.load(Ordering::Relaxed),
        }
    }
}

impl Default for VisualizerPipeline {
    fn default() -> Self {
        Self::new(CaptureSizeRange::default())
    }
}

impl Drop for VisualizerPipeline {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::FnSink;
    use crossbeam::channel;
    use std::sync::Weak;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    type Received = Arc<Mutex<Vec<EncodedFrame>>>;

    fn test_range() -> CaptureSizeRange {
        CaptureSizeRange::new(8, 4096).unwrap()
    }

    fn collector(pipeline: &VisualizerPipeline, kind: StreamKind) -> Received {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        pipeline
            .subscribe(
                kind,
                Arc::new(FnSink::new(move |f: EncodedFrame| {
                    received_clone.lock().unwrap().push(f)
                })),
            )
            .unwrap();
        received
    }

    /// Fixed-sequence fake producer: a repeating sine-ish ramp.
    fn fake_buffer(len: usize, seed: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (((i + seed) % 17) as f32 - 8.0) / 8.0)
            .collect()
    }

    #[derive(Clone, Default)]
    struct StubSession {
        activations: Arc<AtomicUsize>,
        deactivations: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CaptureSession for StubSession {
        fn activate(&mut self) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("microphone unavailable");
            }
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn deactivate(&mut self) {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let pipeline = VisualizerPipeline::new(test_range());
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);

        let err = pipeline.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        assert!(pipeline.stop().is_err());

        pipeline.configure(1024).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);
        assert_eq!(pipeline.capture_size(), Some(1024));

        pipeline.start().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Capturing);
        pipeline.start().unwrap();

        pipeline.stop().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);
        pipeline.stop().unwrap();

        pipeline.release();
        assert_eq!(pipeline.state(), PipelineState::Released);
        assert_eq!(pipeline.capture_size(), None);
    }

    #[test]
    fn test_operations_after_release_fail() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(8).unwrap();
        pipeline.release();

        assert_eq!(pipeline.configure(8), Err(VisualizerError::NotInitialized));
        assert_eq!(pipeline.start(), Err(VisualizerError::NotInitialized));
        assert_eq!(pipeline.stop(), Err(VisualizerError::NotInitialized));
        assert_eq!(
            pipeline.deliver_samples(&[0.0; 8]),
            Err(VisualizerError::NotInitialized)
        );
        assert!(
            pipeline
                .subscribe(StreamKind::Fft, Arc::new(FnSink::new(|_: EncodedFrame| {})))
                .is_err()
        );
    }

    #[test]
    fn test_release_twice_is_noop() {
        let session = StubSession::default();
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.attach_session(Box::new(session.clone())).unwrap();
        pipeline.configure(8).unwrap();
        pipeline.start().unwrap();

        pipeline.release();
        pipeline.release();
        drop(pipeline);

        assert_eq!(session.activations.load(Ordering::SeqCst), 1);
        assert_eq!(session.deactivations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_configure_validation() {
        let pipeline = VisualizerPipeline::new(CaptureSizeRange::new(128, 2048).unwrap());

        let err = pipeline.configure(4096).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, VisualizerError::CaptureSizeOutOfRange { .. }));

        assert!(matches!(
            pipeline.configure(1000),
            Err(VisualizerError::InvalidCaptureSize { size: 1000 })
        ));
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    }

    #[test]
    fn test_silence_end_to_end() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(8).unwrap();
        let waveform = collector(&pipeline, StreamKind::Waveform);
        let fft = collector(&pipeline, StreamKind::Fft);
        pipeline.start().unwrap();

        pipeline.deliver_samples(&[0.0; 8]).unwrap();

        let waveform = waveform.lock().unwrap();
        let fft = fft.lock().unwrap();
        assert_eq!(waveform.len(), 1);
        assert_eq!(fft.len(), 1);
        assert_eq!(waveform[0].data(), &[0i8; 8]);
        assert_eq!(fft[0].data(), &[0i8; 8]);
        assert_eq!(waveform[0].sequence, fft[0].sequence);
    }

    #[test]
    fn test_reconfigure_mid_capture() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(1024).unwrap();
        let waveform = collector(&pipeline, StreamKind::Waveform);
        let fft = collector(&pipeline, StreamKind::Fft);
        pipeline.start().unwrap();

        for seed in 0..3 {
            pipeline.deliver_samples(&fake_buffer(1500, seed)).unwrap();
        }
        pipeline.configure(2048).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Capturing);
        for seed in 0..3 {
            pipeline.deliver_samples(&fake_buffer(1500, seed)).unwrap();
        }

        for frames in [waveform.lock().unwrap(), fft.lock().unwrap()] {
            let lengths: Vec<usize> = frames.iter().map(EncodedFrame::len).collect();
            assert_eq!(lengths, vec![1024, 1024, 1024, 2048, 2048, 2048]);
        }
    }

    #[test]
    fn test_concurrent_reconfigure_never_emits_other_lengths() {
        let pipeline = Arc::new(VisualizerPipeline::new(test_range()));
        pipeline.configure(1024).unwrap();
        let fft = collector(&pipeline, StreamKind::Fft);
        pipeline.start().unwrap();

        let producer = {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                for seed in 0..200 {
                    pipeline.deliver_samples(&fake_buffer(777, seed)).unwrap();
                }
            })
        };
        for size in [2048, 1024, 2048] {
            pipeline.configure(size).unwrap();
        }
        producer.join().unwrap();

        let frames = fft.lock().unwrap();
        assert_eq!(frames.len(), 200);
        assert!(frames.iter().all(|f| f.len() == 1024 || f.len() == 2048));
    }

    #[test]
    fn test_no_subscriber_still_completes() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(8).unwrap();
        pipeline.start().unwrap();

        pipeline.deliver_samples(&fake_buffer(8, 0)).unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(stats.waveform_emitted, 0);
        assert_eq!(stats.fft_emitted, 0);
    }

    #[test]
    fn test_unsubscribe_drops_silently() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(8).unwrap();
        let waveform = collector(&pipeline, StreamKind::Waveform);
        pipeline.start().unwrap();

        pipeline.deliver_samples(&fake_buffer(8, 0)).unwrap();
        pipeline.unsubscribe(StreamKind::Waveform).unwrap();
        pipeline.deliver_samples(&fake_buffer(8, 1)).unwrap();

        assert_eq!(waveform.lock().unwrap().len(), 1);
        assert!(!pipeline.is_subscribed(StreamKind::Waveform));
    }

    #[test]
    fn test_nothing_emitted_after_stop() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(8).unwrap();
        let waveform = collector(&pipeline, StreamKind::Waveform);

        pipeline.deliver_samples(&fake_buffer(8, 0)).unwrap();
        pipeline.start().unwrap();
        pipeline.deliver_samples(&fake_buffer(8, 1)).unwrap();
        pipeline.stop().unwrap();
        pipeline.deliver_samples(&fake_buffer(8, 2)).unwrap();

        assert_eq!(waveform.lock().unwrap().len(), 1);
        assert_eq!(pipeline.stats().frames_dropped, 2);
    }

    #[test]
    fn test_session_activated_on_start() {
        let session = StubSession::default();
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.attach_session(Box::new(session.clone())).unwrap();
        pipeline.configure(8).unwrap();

        pipeline.start().unwrap();
        pipeline.stop().unwrap();
        pipeline.start().unwrap();

        assert_eq!(session.activations.load(Ordering::SeqCst), 2);
        assert_eq!(session.deactivations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_failure_keeps_configured() {
        let session = StubSession {
            fail: true,
            ..Default::default()
        };
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.attach_session(Box::new(session)).unwrap();
        pipeline.configure(8).unwrap();

        let err = pipeline.start().unwrap_err();
        assert_eq!(
            err,
            VisualizerError::Session("microphone unavailable".to_string())
        );
        assert_eq!(pipeline.state(), PipelineState::Configured);
    }

    #[test]
    fn test_capture_rate_limit() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline
            .apply_config(PipelineConfig {
                capture_size: 8,
                sampling_rate_hint: 44100,
                max_capture_rate_hz: Some(0.001),
            })
            .unwrap();
        let fft = collector(&pipeline, StreamKind::Fft);
        pipeline.start().unwrap();

        for seed in 0..5 {
            pipeline.deliver_samples(&fake_buffer(8, seed)).unwrap();
        }

        let frames = fft.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sampling_rate, 44100);
        assert_eq!(pipeline.stats().frames_dropped, 4);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(16).unwrap();
        let waveform = collector(&pipeline, StreamKind::Waveform);
        pipeline.start().unwrap();

        for seed in 0..4 {
            pipeline.deliver_samples(&fake_buffer(16, seed)).unwrap();
        }

        let sequences: Vec<u64> = waveform.lock().unwrap().iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    /// Runs `deliver_samples` on another thread and fails instead of hanging.
    fn deliver_with_timeout(pipeline: &Arc<VisualizerPipeline>, samples: Vec<f32>) {
        let (done_tx, done_rx) = channel::bounded(1);
        let pipeline = pipeline.clone();
        thread::spawn(move || {
            let result = pipeline.deliver_samples(&samples);
            let _ = done_tx.send(result);
        });
        let result = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("deliver_samples did not return");
        result.unwrap();
    }

    #[test]
    fn test_sink_can_unsubscribe_itself() {
        let pipeline = Arc::new(VisualizerPipeline::new(test_range()));
        pipeline.configure(8).unwrap();
        let received = Arc::new(AtomicUsize::new(0));

        let weak: Weak<VisualizerPipeline> = Arc::downgrade(&pipeline);
        let received_clone = received.clone();
        pipeline
            .subscribe(
                StreamKind::Waveform,
                Arc::new(FnSink::new(move |_: EncodedFrame| {
                    received_clone.fetch_add(1, Ordering::SeqCst);
                    if let Some(pipeline) = weak.upgrade() {
                        pipeline.unsubscribe(StreamKind::Waveform).unwrap();
                    }
                })),
            )
            .unwrap();
        pipeline.start().unwrap();

        deliver_with_timeout(&pipeline, vec![0.1; 8]);
        deliver_with_timeout(&pipeline, vec![0.1; 8]);

        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert!(!pipeline.is_subscribed(StreamKind::Waveform));
    }

    #[test]
    fn test_sink_can_query_and_stop_pipeline() {
        let pipeline = Arc::new(VisualizerPipeline::new(test_range()));
        pipeline.configure(8).unwrap();
        let seen_states = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&pipeline);
        let seen_clone = seen_states.clone();
        pipeline
            .subscribe(
                StreamKind::Fft,
                Arc::new(FnSink::new(move |_: EncodedFrame| {
                    let Some(pipeline) = weak.upgrade() else {
                        return;
                    };
                    seen_clone.lock().unwrap().push(pipeline.state());
                    assert_eq!(pipeline.config().capture_size, 8);
                    pipeline.configure(16).unwrap();
                    pipeline.stop().unwrap();
                })),
            )
            .unwrap();
        pipeline.start().unwrap();

        deliver_with_timeout(&pipeline, vec![0.1; 8]);
        deliver_with_timeout(&pipeline, vec![0.1; 8]);

        assert_eq!(*seen_states.lock().unwrap(), vec![PipelineState::Capturing]);
        assert_eq!(pipeline.state(), PipelineState::Configured);
        assert_eq!(pipeline.capture_size(), Some(16));
        assert_eq!(pipeline.stats().frames_dropped, 1);
    }

    #[test]
    fn test_concurrent_configure_keeps_config_and_analyzer_in_step() {
        for _ in 0..100 {
            let pipeline = Arc::new(VisualizerPipeline::new(test_range()));
            pipeline.configure(8).unwrap();

            let handles: Vec<_> = [4096, 8]
                .into_iter()
                .map(|size| {
                    let pipeline = pipeline.clone();
                    thread::spawn(move || pipeline.configure(size).unwrap())
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let configured = pipeline.config().capture_size;
            assert_eq!(pipeline.capture_size(), Some(configured));

            let fft = collector(&pipeline, StreamKind::Fft);
            pipeline.start().unwrap();
            pipeline.deliver_samples(&fake_buffer(100, 0)).unwrap();
            assert_eq!(fft.lock().unwrap()[0].len(), configured);
        }
    }

    #[test]
    fn test_configure_keeps_other_settings() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline
            .apply_config(PipelineConfig {
                capture_size: 8,
                sampling_rate_hint: 22050,
                max_capture_rate_hz: Some(30.0),
            })
            .unwrap();

        pipeline.configure(16).unwrap();

        let config = pipeline.config();
        assert_eq!(config.capture_size, 16);
        assert_eq!(config.sampling_rate_hint, 22050);
        assert_eq!(config.max_capture_rate_hz, Some(30.0));
    }

    #[test]
    fn test_release_recovers_from_poisoned_locks() {
        let pipeline = VisualizerPipeline::new(test_range());
        pipeline.configure(8).unwrap();
        pipeline.start().unwrap();

        thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _frame = pipeline.frame.lock().unwrap();
                let _state = pipeline.state.lock().unwrap();
                panic!("sink failure while holding the pipeline locks");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(pipeline.frame.is_poisoned());

        assert_eq!(pipeline.state(), PipelineState::Capturing);
        pipeline.release();
        assert_eq!(pipeline.state(), PipelineState::Released);
        assert_eq!(pipeline.capture_size(), None);
    }
}
