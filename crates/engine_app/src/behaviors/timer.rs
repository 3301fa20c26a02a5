//! Timer: fires an event when a countdown expires.

use std::cell::Cell;

use engine_component::Entity;
use tracing::debug;

use super::{Behavior, Emit};
use crate::world::World;

/// Counts down `duration` seconds and fires with its owner as activator.
#[derive(Debug)]
pub struct Timer {
    duration: f32,
    repeat: bool,
    emit: Emit,
    remaining: Cell<f32>,
    fired: Cell<u32>,
    finished: Cell<bool>,
}

impl Timer {
    /// Fire `emit` once after `duration` seconds.
    #[must_use]
    pub fn once(duration: f32, emit: Emit) -> Self {
        Self {
            duration,
            repeat: false,
            emit,
            remaining: Cell::new(duration),
            fired: Cell::new(0),
            finished: Cell::new(false),
        }
    }

    /// Fire `emit` every `duration` seconds. Fires at most once per update.
    #[must_use]
    pub fn repeating(duration: f32, emit: Emit) -> Self {
        Self {
            repeat: true,
            ..Self::once(duration, emit)
        }
    }

    /// Returns how many times the timer has fired.
    #[must_use]
    pub fn fired(&self) -> u32 {
        self.fired.get()
    }

    /// Returns the seconds left until the next expiry.
    #[must_use]
    pub fn remaining(&self) -> f32 {
        self.remaining.get()
    }
}

impl Behavior for Timer {
    fn update(&self, world: &World, owner: Entity, dt: f32) {
        if self.finished.get() {
            return;
        }
        let remaining = self.remaining.get() - dt;
        if remaining > 0.0 {
            self.remaining.set(remaining);
            return;
        }

        if self.repeat {
            let next = remaining + self.duration;
            self.remaining.set(if next > 0.0 { next } else { self.duration.max(0.0) });
        } else {
            self.remaining.set(0.0);
            self.finished.set(true);
        }
        self.fired.set(self.fired.get() + 1);
        let delivered = self.emit.fire(world.bus(), owner, Some(owner), None);
        debug!(owner = %owner, channel = %self.emit.channel, delivered, "timer expired");
    }
}
