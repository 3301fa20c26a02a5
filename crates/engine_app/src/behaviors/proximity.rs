//! Proximity trigger: fires when labeled entities come within range.

use std::cell::RefCell;
use std::collections::BTreeSet;

use engine_component::Entity;
use tracing::trace;

use super::{Behavior, Emit};
use crate::world::World;

/// Watches for bearers of `label` entering a radius around its owner.
///
/// Fires once per entry, with the entering entity as both activator and
/// explicit target, so [`TargetMode::Other`](engine_event::TargetMode::Other)
/// reaches that entity's own listeners. An entity must leave the radius
/// before it can trigger again.
#[derive(Debug)]
pub struct ProximityTrigger {
    label: String,
    radius: f32,
    max_count: usize,
    emit: Emit,
    inside: RefCell<BTreeSet<Entity>>,
}

impl ProximityTrigger {
    /// Watch for `label` bearers within `radius`, any number at a time.
    #[must_use]
    pub fn new(label: impl Into<String>, radius: f32, emit: Emit) -> Self {
        Self {
            label: label.into(),
            radius,
            max_count: 0,
            emit,
            inside: RefCell::new(BTreeSet::new()),
        }
    }

    /// Fire for at most `max_count` newly entered entities per update
    /// (`0` = unlimited). Entities left over fire on a later update if they
    /// are still inside.
    #[must_use]
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    /// Returns the entities currently inside the radius.
    #[must_use]
    pub fn inside(&self) -> Vec<Entity> {
        self.inside.borrow().iter().copied().collect()
    }
}

impl Behavior for ProximityTrigger {
    fn update(&self, world: &World, owner: Entity, _dt: f32) {
        let found: BTreeSet<Entity> = world
            .label_registry()
            .find_in_radius(owner, self.radius, 0, &self.label, world)
            .into_iter()
            .collect();

        let entered: Vec<Entity> = {
            let mut inside = self.inside.borrow_mut();
            inside.retain(|e| found.contains(e));
            let limit = if self.max_count == 0 { usize::MAX } else { self.max_count };
            let entered: Vec<Entity> = found.difference(&inside).copied().take(limit).collect();
            inside.extend(entered.iter().copied());
            entered
        };

        for entity in entered {
            trace!(owner = %owner, entity = %entity, label = %self.label, "entered proximity");
            self.emit.fire(world.bus(), owner, Some(entity), Some(entity));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use engine_event::{Acceptance, BusConfig, TargetMode};
    use engine_math::Position;

    use super::*;
    use crate::behaviors::Counter;

    #[test]
    fn test_fires_once_per_entry() {
        let mut world = World::new(&BusConfig::with_channels(["Touched"]));
        let ch = world.channel("Touched").unwrap();
        let sensor = world.spawn(Some(Position::ORIGIN));
        let enemy = world.spawn(Some(Position::new(1.0, 0.0, 0.0)));
        world.add_label(enemy, "enemy");

        let touched = Rc::new(Counter::new(Acceptance::Owner, 0));
        world.subscribe(enemy, &ch, Rc::clone(&touched));

        let trigger = ProximityTrigger::new("enemy", 2.0, Emit::new(ch, TargetMode::Other));
        trigger.update(&world, sensor, 0.1);
        trigger.update(&world, sensor, 0.1);
        assert_eq!(touched.count(), 1);
        assert_eq!(trigger.inside(), vec![enemy]);

        world.set_position(enemy, Position::new(10.0, 0.0, 0.0));
        trigger.update(&world, sensor, 0.1);
        assert!(trigger.inside().is_empty());

        world.set_position(enemy, Position::new(2.0, 0.0, 0.0));
        trigger.update(&world, sensor, 0.1);
        assert_eq!(touched.count(), 2);
    }

    #[test]
    fn test_other_mode_reaches_only_the_entering_entity() {
        let mut world = World::new(&BusConfig::with_channels(["Touched"]));
        let ch = world.channel("Touched").unwrap();
        let sensor = world.spawn(Some(Position::ORIGIN));
        let near = world.spawn(Some(Position::new(1.0, 0.0, 0.0)));
        let far = world.spawn(Some(Position::new(50.0, 0.0, 0.0)));
        let near_hits = Rc::new(Counter::new(Acceptance::Any, 0));
        let far_hits = Rc::new(Counter::new(Acceptance::Any, 0));
        for (e, c) in [(near, &near_hits), (far, &far_hits)] {
            world.add_label(e, "enemy");
            world.subscribe(e, &ch, Rc::clone(c));
        }

        world.attach(
            sensor,
            Rc::new(ProximityTrigger::new("enemy", 5.0, Emit::new(ch, TargetMode::Other))),
        );
        world.update(0.1);
        assert_eq!(near_hits.count(), 1);
        assert_eq!(far_hits.count(), 0);
    }

    #[test]
    fn test_capped_entries_fire_once_each() {
        let mut world = World::new(&BusConfig::with_channels(["Touched"]));
        let ch = world.channel("Touched").unwrap();
        let sensor = world.spawn(Some(Position::ORIGIN));
        let watcher = world.spawn(None);
        let heard = Rc::new(Counter::new(Acceptance::Any, 0));
        world.subscribe(watcher, &ch, Rc::clone(&heard));
        let enemies: Vec<Entity> = (1..=3)
            .map(|i| {
                let e = world.spawn(Some(Position::new(i as f32, 0.0, 0.0)));
                world.add_label(e, "enemy");
                e
            })
            .collect();

        let trigger = ProximityTrigger::new("enemy", 5.0, Emit::new(ch, TargetMode::All))
            .with_max_count(2);
        trigger.update(&world, sensor, 0.1);
        assert_eq!(heard.count(), 2);
        assert_eq!(trigger.inside().len(), 2);

        trigger.update(&world, sensor, 0.1);
        assert_eq!(heard.count(), 3);
        assert_eq!(trigger.inside(), enemies);

        for _ in 0..3 {
            trigger.update(&world, sensor, 0.1);
        }
        assert_eq!(heard.count(), 3);
    }
}
