//! Device I/O.
//!
//! - [`AudioInput`] - cpal microphone capture, used as the pipeline's capture session

pub mod audio;

pub use audio::AudioInput;
