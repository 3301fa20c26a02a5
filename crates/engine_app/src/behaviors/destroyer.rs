//! Destroyer: despawns an entity when it hears an accepted event.

use engine_event::{Acceptance, Event, Listener, ListenerError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::{Command, CommandQueue};

/// Which entity a [`Destroyer`] removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyTarget {
    /// The event's activator.
    #[default]
    Activator,
    /// The destroyer's own entity.
    Owner,
}

/// Queues a despawn for each accepted delivery.
#[derive(Debug)]
pub struct Destroyer {
    acceptance: Acceptance,
    target: DestroyTarget,
    commands: CommandQueue,
}

impl Destroyer {
    /// Destroy `target` whenever a delivery passes `acceptance`.
    #[must_use]
    pub fn new(acceptance: Acceptance, target: DestroyTarget, commands: CommandQueue) -> Self {
        Self {
            acceptance,
            target,
            commands,
        }
    }
}

impl Listener for Destroyer {
    fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
        if !self
            .acceptance
            .accepts(event.activator, event.owner, &event.labels())
        {
            return Ok(());
        }
        let victim = match self.target {
            DestroyTarget::Activator => event.activator,
            DestroyTarget::Owner => Some(event.owner),
        };
        if let Some(victim) = victim {
            debug!(owner = %event.owner, victim = %victim, "despawn queued");
            self.commands.borrow_mut().push(Command::Despawn(victim));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "destroyer"
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use engine_event::{BusConfig, DispatchRequest, TargetMode};

    use super::*;
    use crate::world::World;

    #[test]
    fn test_destroys_labeled_activator() {
        let mut world = World::new(&BusConfig::with_channels(["Hit"]));
        let ch = world.channel("Hit").unwrap();
        let cleaner = world.spawn(None);
        let enemy = world.spawn(None);
        let wall = world.spawn(None);
        world.add_label(enemy, "enemy");
        let destroyer = Destroyer::new(
            Acceptance::Labels(vec!["enemy".into()]),
            DestroyTarget::Activator,
            world.commands(),
        );
        world.subscribe(cleaner, &ch, Rc::new(destroyer));

        for activator in [wall, enemy] {
            let req = DispatchRequest::new(ch.clone(), TargetMode::All).activator(activator);
            world.bus().dispatch(&req);
        }
        world.flush();
        assert!(world.is_alive(wall));
        assert!(!world.is_alive(enemy));
        assert!(world.label_registry().find_all("enemy").is_empty());
    }

    #[test]
    fn test_self_destruct_unsubscribes_owner() {
        let mut world = World::new(&BusConfig::with_channels(["Hit"]));
        let ch = world.channel("Hit").unwrap();
        let bomb = world.spawn(None);
        let destroyer = Destroyer::new(Acceptance::Any, DestroyTarget::Owner, world.commands());
        world.subscribe(bomb, &ch, Rc::new(destroyer));

        assert_eq!(world.bus().dispatch(&DispatchRequest::new(ch.clone(), TargetMode::All)), 1);
        world.flush();
        assert!(!world.is_alive(bomb));
        assert_eq!(world.bus().subscriber_count(&ch), 0);
        assert_eq!(world.bus().dispatch(&DispatchRequest::new(ch, TargetMode::All)), 0);
    }
}
