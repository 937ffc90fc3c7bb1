//! Object-safe sink trait.
//!
//! [`Pushable<T>`] is the output interface of the pipeline: every encoded
//! frame is handed to a `Pushable` and the pipeline keeps no claim on it.
//! Implementations must return promptly, since `push` is called from the
//! audio callback thread. Anything slow belongs behind a
//! [`ChannelSink`](super::ChannelSink).

use std::sync::Arc;

/// Passive receiver - can receive pushed data.
pub trait Pushable<T>: Send + Sync {
    fn push(&self, input: T);
}

impl<T: Send + Sync> Pushable<T> for Arc<dyn Pushable<T>> {
    fn push(&self, input: T) {
        (**self).push(input)
    }
}
