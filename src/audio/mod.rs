//! Audio data types.
//!
//! - [`AudioSample`] - Device sample formats normalized to f32
//! - [`frame::FrameBuffer`] - Truncates or pads deliveries to the capture size
//! - [`frame::AudioFrame`] - One fixed-size block of samples

pub mod frame;
pub mod sample;

pub use frame::{AudioFrame, FrameBuffer, normalize_frame};
pub use sample::{AudioSample, first_channel_into};
