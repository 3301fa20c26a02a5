//! Spawner: queues a labeled entity whenever it hears an accepted event.

use engine_event::{Acceptance, Event, Listener, ListenerError};
use engine_math::Vec3;
use tracing::debug;

use super::Emit;
use crate::world::{Command, CommandQueue};

/// Spawns an entity at its owner's position plus `offset`.
///
/// The spawn happens when the world flushes its commands, after which
/// `announce` (if set) fires with the new entity as activator.
#[derive(Debug)]
pub struct Spawner {
    acceptance: Acceptance,
    labels: Vec<String>,
    offset: Vec3,
    announce: Option<Emit>,
    commands: CommandQueue,
}

impl Spawner {
    /// Spawn entities carrying `labels` into the world owning `commands`.
    #[must_use]
    pub fn new<I, S>(acceptance: Acceptance, labels: I, commands: CommandQueue) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            acceptance,
            labels: labels.into_iter().map(Into::into).collect(),
            offset: Vec3::ZERO,
            announce: None,
            commands,
        }
    }

    /// Place spawned entities at this offset from the owner.
    #[must_use]
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Fire `emit` once each spawned entity exists.
    #[must_use]
    pub fn announce(mut self, emit: Emit) -> Self {
        self.announce = Some(emit);
        self
    }
}

impl Listener for Spawner {
    fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
        if !self
            .acceptance
            .accepts(event.activator, event.owner, &event.labels())
        {
            return Ok(());
        }
        debug!(owner = %event.owner, labels = ?self.labels, "spawn queued");
        self.commands.borrow_mut().push(Command::Spawn {
            origin: event.owner,
            offset: self.offset,
            labels: self.labels.clone(),
            announce: self.announce.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "spawner"
    }
}
