//! Pipeline plumbing: sinks, the dual-stream emitter and the lifecycle-managed
//! [`VisualizerPipeline`].
//!
//! Data flow for one delivery:
//!
//! ```text
//! capture -> FrameBuffer -+-> encode_waveform ------------------> waveform sink
//!                         +-> window -> SplitRealFft -> encode_fft -> fft sink
//! ```

pub mod dyn_traits;
pub mod emitter;
pub mod frame;
pub mod session;
pub mod sink;
pub mod throttle;
pub mod visualizer;

pub use dyn_traits::Pushable;
pub use emitter::{DualStreamEmitter, EmitOutcome};
pub use frame::{EncodedFrame, StreamKind};
pub use session::CaptureSession;
pub use sink::{ChannelSink, FnSink, SinkSlot, SinkWorker};
pub use throttle::RateLimiter;
pub use visualizer::{PipelineState, PipelineStats, VisualizerPipeline};
