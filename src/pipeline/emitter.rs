//! Dual-stream emitter.
//!
//! Fans each analyzed frame out to two independent subscriber slots, one per
//! [`StreamKind`]. Neither slot knows about the other: a missing subscriber
//! on one stream never affects delivery on the other.

use std::sync::Arc;

use crate::analysis::AnalyzedFrame;

use super::dyn_traits::Pushable;
use super::frame::{EncodedFrame, StreamKind};
use super::sink::SinkSlot;

/// Which streams actually had a subscriber for one emitted pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOutcome {
    pub waveform: bool,
    pub fft: bool,
}

#[derive(Default)]
pub struct DualStreamEmitter {
    waveform: SinkSlot<EncodedFrame>,
    fft: SinkSlot<EncodedFrame>,
}

impl DualStreamEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: StreamKind) -> &SinkSlot<EncodedFrame> {
        match kind {
            StreamKind::Waveform => &self.waveform,
            StreamKind::Fft => &self.fft,
        }
    }

    pub fn subscribe(&self, kind: StreamKind, sink: Arc<dyn Pushable<EncodedFrame>>) {
        self.slot(kind).set(sink);
    }

    /// Removes the subscriber. Returns `false` if there was none.
    pub fn unsubscribe(&self, kind: StreamKind) -> bool {
        self.slot(kind).clear().is_some()
    }

    pub fn is_subscribed(&self, kind: StreamKind) -> bool {
        self.slot(kind).is_subscribed()
    }

    pub fn clear(&self) {
        self.waveform.clear();
        self.fft.clear();
    }

    pub fn emit(&self, frame: AnalyzedFrame, sequence: u64, sampling_rate: u32) -> EmitOutcome {
        let AnalyzedFrame { waveform, fft } = frame;
        EmitOutcome {
            waveform: self.waveform.deliver(EncodedFrame::new(
                StreamKind::Waveform,
                sequence,
                sampling_rate,
                waveform,
            )),
            fft: self.fft.deliver(EncodedFrame::new(
                StreamKind::Fft,
                sequence,
                sampling_rate,
                fft,
            )),
        }
    }
}
