//! Behavior registry: tracks what is attached to each entity.
//!
//! The world keeps every behavior and listener it attaches alive here, along
//! with the subscription guards that tie listeners to the bus. Removing an
//! entity drops all of it at once, which is what unregisters the entity's
//! listeners from every channel.

use std::collections::BTreeMap;
use std::rc::Rc;

use engine_component::Entity;
use engine_event::{Listener, Subscription};

use crate::behaviors::Behavior;

/// Everything attached to one entity.
#[derive(Default)]
struct Attached {
    /// Per-frame behaviors.
    behaviors: Vec<Rc<dyn Behavior>>,
    /// Strong references to listeners the bus only holds weakly.
    listeners: Vec<Rc<dyn Listener>>,
    /// Guards for the listeners' channel registrations.
    subscriptions: Vec<Subscription>,
}

/// Registry of behaviors and subscriptions, keyed by owning entity.
#[derive(Default)]
pub struct BehaviorRegistry {
    by_entity: BTreeMap<Entity, Attached>,
}

impl BehaviorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a per-frame behavior to `entity`.
    pub fn register_behavior(&mut self, entity: Entity, behavior: Rc<dyn Behavior>) {
        self.by_entity
            .entry(entity)
            .or_default()
            .behaviors
            .push(behavior);
    }

    /// Keep `listener` and its `subscription` alive for as long as `entity`.
    ///
    /// The same listener may be registered against several channels; it is
    /// stored once.
    pub fn register_listener(
        &mut self,
        entity: Entity,
        listener: Rc<dyn Listener>,
        subscription: Subscription,
    ) {
        let attached = self.by_entity.entry(entity).or_default();
        let key = Rc::as_ptr(&listener).cast::<()>();
        if !attached
            .listeners
            .iter()
            .any(|l| Rc::as_ptr(l).cast::<()>() == key)
        {
            attached.listeners.push(listener);
        }
        attached.subscriptions.push(subscription);
    }

    /// Drop everything attached to `entity`.
    ///
    /// Returns `true` if anything was attached.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        self.by_entity.remove(&entity).is_some()
    }

    /// Iterate every per-frame behavior with its owner.
    pub fn behaviors(&self) -> impl Iterator<Item = (Entity, &Rc<dyn Behavior>)> {
        self.by_entity
            .iter()
            .flat_map(|(&entity, a)| a.behaviors.iter().map(move |b| (entity, b)))
    }

    /// Returns the number of entities with something attached.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    /// Returns the total number of per-frame behaviors.
    #[must_use]
    pub fn behavior_count(&self) -> usize {
        self.by_entity.values().map(|a| a.behaviors.len()).sum()
    }

    /// Returns the total number of subscription guards held.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.by_entity.values().map(|a| a.subscriptions.len()).sum()
    }
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("entities", &self.entity_count())
            .field("behaviors", &self.behavior_count())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
