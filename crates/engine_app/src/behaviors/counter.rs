//! Counter: counts accepted events and fires once a target is reached.

use std::cell::Cell;

use engine_event::{Acceptance, Event, Listener, ListenerError};
use tracing::{debug, info};

use super::Emit;

/// Counts deliveries that pass its [`Acceptance`] filter.
///
/// When the count reaches `target` the counter fires `on_reached` with the
/// triggering activator, and starts over if `reset` is set.
#[derive(Debug)]
pub struct Counter {
    acceptance: Acceptance,
    target: u32,
    reset: bool,
    on_reached: Option<Emit>,
    count: Cell<u32>,
    reached: Cell<u32>,
}

impl Counter {
    /// Count deliveries accepted by `acceptance` up to `target`.
    ///
    /// A `target` of `0` counts forever and never fires.
    #[must_use]
    pub fn new(acceptance: Acceptance, target: u32) -> Self {
        Self {
            acceptance,
            target,
            reset: false,
            on_reached: None,
            count: Cell::new(0),
            reached: Cell::new(0),
        }
    }

    /// Start over from zero each time the target is reached.
    #[must_use]
    pub fn resetting(mut self) -> Self {
        self.reset = true;
        self
    }

    /// Fire `emit` each time the target is reached.
    #[must_use]
    pub fn on_reached(mut self, emit: Emit) -> Self {
        self.on_reached = Some(emit);
        self
    }

    /// Returns the current count.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    /// Returns how many times the target was reached.
    #[must_use]
    pub fn times_reached(&self) -> u32 {
        self.reached.get()
    }
}

impl Listener for Counter {
    fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
        if !self
            .acceptance
            .accepts(event.activator, event.owner, &event.labels())
        {
            return Ok(());
        }

        let count = self.count.get() + 1;
        self.count.set(count);
        debug!(owner = %event.owner, channel = %event.channel, count, "counter incremented");

        if self.target == 0 || count != self.target {
            return Ok(());
        }
        self.reached.set(self.reached.get() + 1);
        if self.reset {
            self.count.set(0);
        }
        info!(owner = %event.owner, target = self.target, "counter reached target");
        if let Some(emit) = &self.on_reached {
            emit.fire(event.bus, event.owner, event.activator, event.activator);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}
