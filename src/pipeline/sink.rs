//! Output sinks and subscriber slots.
//!
//! - [`SinkSlot`] - zero or one subscriber for one stream; empty means drop
//! - [`FnSink`] - adapts a closure into a [`Pushable`]
//! - [`ChannelSink`] / [`SinkWorker`] - fire-and-forget handoff to a consumer thread

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, trace, warn};

use super::dyn_traits::Pushable;

/// Holds the current subscriber of one stream, if any.
pub struct SinkSlot<T> {
    sink: RwLock<Option<Arc<dyn Pushable<T>>>>,
}

impl<T> SinkSlot<T> {
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
        }
    }

    /// Installs `sink`, returning the subscriber it replaced.
    pub fn set(&self, sink: Arc<dyn Pushable<T>>) -> Option<Arc<dyn Pushable<T>>> {
        self.sink.write().unwrap().replace(sink)
    }

    pub fn clear(&self) -> Option<Arc<dyn Pushable<T>>> {
        self.sink.write().unwrap().take()
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.read().unwrap().is_some()
    }

    /// Hands `item` to the subscriber. Returns `false` if the slot is empty and the item was dropped.
    ///
    /// The subscriber runs outside the slot lock, so it may replace or clear the slot itself.
    pub fn deliver(&self, item: T) -> bool {
        let sink = self.sink.read().unwrap().clone();
        match sink {
            Some(sink) => {
                sink.push(item);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for SinkSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls a closure synchronously with every pushed item.
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<T, F> Pushable<T> for FnSink<F>
where
    F: Fn(T) + Send + Sync,
{
    fn push(&self, input: T) {
        (self.callback)(input)
    }
}

/// Posts items into a bounded channel without ever blocking.
///
/// A full channel or a consumer that went away drops the item.
pub struct ChannelSink<T> {
    sender: Sender<T>,
}

impl<T> ChannelSink<T> {
    pub fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (sender, receiver) = channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl<T: Send> Pushable<T> for ChannelSink<T> {
    fn push(&self, input: T) {
        if let Err(err) = self.sender.try_send(input) {
            trace!("Dropping item: {}", err);
        }
    }
}

/// A consumer thread draining a [`ChannelSink`].
///
/// The thread exits once every `ChannelSink` feeding it has been dropped.
pub struct SinkWorker {
    name: String,
    handle: JoinHandle<()>,
}

impl SinkWorker {
    pub fn spawn<T, F>(name: &str, capacity: usize, mut callback: F) -> (Arc<ChannelSink<T>>, Self)
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let (sink, receiver) = ChannelSink::bounded(capacity);
        let thread_name = name.to_string();
        let handle = thread::spawn(move || {
            debug!("Sink worker {} started", thread_name);
            for item in receiver.iter() {
                callback(item);
            }
            debug!("Sink worker {} finished", thread_name);
        });
        (
            Arc::new(sink),
            Self {
                name: name.to_string(),
                handle,
            },
        )
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("Sink worker {} panicked", self.name);
        }
    }
}
