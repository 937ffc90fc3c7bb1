use std::fmt::Debug;

use num_traits::{Bounded, ToPrimitive};

/// A device sample format that can be normalized into the `[-1, 1]` float
/// domain the analysis pipeline works in.
///
/// Signed integers scale by their maximum. Unsigned integers are offset
/// binary, centred on half their range.
pub trait AudioSample: Copy + Send + Sync + ToPrimitive + Bounded + Debug + 'static {
    fn to_f32_normalized(self) -> f32 {
        let value = self.to_f64().unwrap_or_default();
        let min = Self::min_value().to_f64().unwrap_or_default();
        let max = Self::max_value().to_f64().unwrap_or(1.0);
        if min < 0.0 {
            (value / max) as f32
        } else {
            let mid = (max + 1.0) / 2.0;
            ((value - mid) / mid) as f32
        }
    }
}

impl AudioSample for f32 {
    fn to_f32_normalized(self) -> f32 {
        self
    }
}

impl AudioSample for i8 {}
impl AudioSample for i16 {}
impl AudioSample for i32 {}
impl AudioSample for u8 {}
impl AudioSample for u16 {}

/// Copies the first channel of an interleaved buffer into `out` as normalized floats.
///
/// `out` is cleared first; its allocation is reused across calls.
pub fn first_channel_into<Sample: AudioSample>(data: &[Sample], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        data.iter()
            .step_by(channels.max(1))
            .map(|s| s.to_f32_normalized()),
    );
}
