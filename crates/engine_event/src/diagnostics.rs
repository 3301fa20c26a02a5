//! Where isolated listener failures go.

use std::cell::RefCell;

use engine_component::Entity;
use tracing::warn;

use crate::channel::Channel;
use crate::error::ListenerError;

/// A listener failure caught at the bus boundary.
#[derive(Debug)]
pub struct Failure {
    /// Channel being delivered.
    pub channel: Channel,
    /// Owner of the failing subscription.
    pub owner: Entity,
    /// [`Listener::name`](crate::Listener::name) of the failing listener.
    pub listener: &'static str,
    /// What went wrong.
    pub error: ListenerError,
}

/// Receives failures the bus isolated from the dispatcher.
pub trait DiagnosticSink {
    /// Called once per failed delivery.
    fn listener_failed(&self, failure: Failure);
}

/// Logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn listener_failed(&self, failure: Failure) {
        warn!(
            channel = %failure.channel,
            owner = %failure.owner,
            listener = failure.listener,
            error = %failure.error,
            "listener reaction failed"
        );
    }
}

/// Keeps failures in memory for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    failures: RefCell<Vec<Failure>>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.borrow().len()
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.borrow().is_empty()
    }

    /// Remove and return every recorded failure.
    pub fn take(&self) -> Vec<Failure> {
        std::mem::take(&mut *self.failures.borrow_mut())
    }
}

impl DiagnosticSink for RecordingSink {
    fn listener_failed(&self, failure: Failure) {
        warn!(channel = %failure.channel, error = %failure.error, "listener reaction failed");
        self.failures.borrow_mut().push(failure);
    }
}
