//! Run Event Channel
//!
//! Fan-out of execution events to zero or more subscribers. The engine's
//! worker publishes; the caller (a UI, the CLI, a test) consumes.
//! Publishing never blocks the worker: channels are unbounded and
//! disconnected subscribers are dropped on the next publish.
//!
//! Ordering: events are published from the single worker thread, so each
//! subscriber observes log lines in process-emission order and the
//! step-finished event for a step after all of that step's log lines.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

/// An event emitted during a sequencer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A line of module output or an informational engine message
    Log(String),
    /// The active step reached a terminal outcome (or was skipped)
    StepFinished,
    /// An execution error, also reflected in the failed run record
    Error(String),
}

/// Fan-out channel for [`RunEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<RunEvent>>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<RunEvent> {
        let (sender, receiver) = channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }

    /// Publishes an event to all live subscribers.
    pub fn publish(&self, event: RunEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|s| s.send(event.clone()).is_ok());
        }
    }

    /// Publishes a log event.
    pub fn log(&self, text: impl Into<String>) {
        self.publish(RunEvent::Log(text.into()));
    }

    /// Publishes an error event.
    pub fn error(&self, text: impl Into<String>) {
        self.publish(RunEvent::Error(text.into()));
    }

    /// Publishes a step-finished event.
    pub fn step_finished(&self) {
        self.publish(RunEvent::StepFinished);
    }

    /// Returns the number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
