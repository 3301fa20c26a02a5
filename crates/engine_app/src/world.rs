//! World state for the simulation.
//!
//! The [`World`] is the single owner of the simulation's shared services:
//! entity allocation, positions, the label registry and the event bus.
//! Behaviors receive it by reference instead of reaching for globals.
//!
//! Structural changes requested while events are being delivered go through
//! the [`CommandQueue`] and are applied by [`World::flush`] once the frame's
//! updates are done, so no entity disappears in the middle of a dispatch.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use engine_component::{Entity, EntityAllocator};
use engine_event::{BusConfig, Channel, ChannelCatalog, EventBus, Listener};
use engine_label::{LabelRegistry, Locate, SharedLabels};
use engine_math::{Position, Vec3};
use tracing::{debug, warn};

use crate::behaviors::{Behavior, Emit};
use crate::registry::BehaviorRegistry;

/// Upper bound on command rounds per flush; each applied command may queue more.
const MAX_FLUSH_ROUNDS: usize = 64;

/// A deferred structural change.
#[derive(Debug, Clone)]
pub enum Command {
    /// Spawn a labeled entity relative to `origin`.
    Spawn {
        /// Entity whose position the new one is placed relative to.
        origin: Entity,
        /// Offset from the origin's position.
        offset: Vec3,
        /// Labels given to the new entity.
        labels: Vec<String>,
        /// Event dispatched once the entity exists, with it as activator.
        announce: Option<Emit>,
    },
    /// Destroy an entity.
    Despawn(Entity),
}

/// Shared handle to the world's pending commands.
pub type CommandQueue = Rc<RefCell<Vec<Command>>>;

/// The simulation context.
pub struct World {
    /// Entity handle allocator.
    entities: EntityAllocator,
    /// World-space positions of placed entities.
    positions: HashMap<Entity, Position>,
    /// Multi-label index.
    labels: SharedLabels,
    /// Event bus resolving tags against `labels`.
    bus: EventBus,
    /// Channels declared at construction.
    catalog: ChannelCatalog,
    /// Behaviors and subscriptions owned by each entity.
    behaviors: BehaviorRegistry,
    /// Structural changes waiting for [`World::flush`].
    commands: CommandQueue,
}

impl World {
    /// Create an empty world with the channels declared in `config`.
    #[must_use]
    pub fn new(config: &BusConfig) -> Self {
        let labels = LabelRegistry::shared();
        let bus = EventBus::new(Rc::clone(&labels));
        Self::with_bus(config, bus)
    }

    /// Create an empty world around an existing bus, sharing its label registry.
    #[must_use]
    pub fn with_bus(config: &BusConfig, bus: EventBus) -> Self {
        Self {
            entities: EntityAllocator::new(),
            positions: HashMap::new(),
            labels: Rc::clone(bus.labels()),
            bus,
            catalog: ChannelCatalog::from_config(config),
            behaviors: BehaviorRegistry::new(),
            commands: CommandQueue::default(),
        }
    }

    // -- Entity lifecycle --

    /// Allocate a new entity, optionally placing it in the world.
    pub fn spawn(&mut self, position: Option<Position>) -> Entity {
        let entity = self.entities.allocate();
        if let Some(position) = position {
            self.positions.insert(entity, position);
        }
        debug!(entity = %entity, "spawned");
        entity
    }

    /// Destroy an entity and tear down everything that refers to it.
    ///
    /// Its labels are purged, every subscription it owns is unregistered and
    /// its behaviors are dropped. Returns `false` for a stale handle.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.free(entity) {
            return false;
        }
        self.behaviors.remove_entity(entity);
        self.bus.unregister_owner(entity);
        self.labels.borrow_mut().remove_entity(entity);
        self.positions.remove(&entity);
        debug!(entity = %entity, "despawned");
        true
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate every live entity.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    // -- Positions --

    /// Place a live entity. Returns `false` for a stale handle.
    pub fn set_position(&mut self, entity: Entity, position: Position) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.positions.insert(entity, position);
        true
    }

    /// Returns the position of `entity`, if it has one.
    #[must_use]
    pub fn position(&self, entity: Entity) -> Option<Position> {
        self.positions.get(&entity).copied()
    }

    // -- Labels --

    /// Shared handle to the label registry.
    #[must_use]
    pub fn labels(&self) -> &SharedLabels {
        &self.labels
    }

    /// Borrow the label registry.
    #[must_use]
    pub fn label_registry(&self) -> Ref<'_, LabelRegistry> {
        self.labels.borrow()
    }

    /// Label a live entity. Returns `false` for a stale handle.
    pub fn add_label(&mut self, entity: Entity, label: &str) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.labels_mut().add_label(entity, label);
        true
    }

    /// Remove a label from an entity.
    pub fn remove_label(&mut self, entity: Entity, label: &str) {
        self.labels_mut().remove_label(entity, label);
    }

    fn labels_mut(&self) -> RefMut<'_, LabelRegistry> {
        self.labels.borrow_mut()
    }

    // -- Events --

    /// The world's event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The channels declared for this world.
    #[must_use]
    pub fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    /// Look up a declared channel.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.catalog.get(name)
    }

    // -- Behaviors --

    /// Attach a per-frame behavior to a live entity.
    pub fn attach(&mut self, entity: Entity, behavior: Rc<dyn Behavior>) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.behaviors.register_behavior(entity, behavior);
        true
    }

    /// Subscribe `listener` to `channel` on behalf of a live entity.
    ///
    /// The world keeps the listener and its subscription until the entity is
    /// despawned.
    pub fn subscribe<L: Listener + 'static>(
        &mut self,
        entity: Entity,
        channel: &Channel,
        listener: Rc<L>,
    ) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let subscription = self.bus.register(channel, entity, &listener);
        self.behaviors
            .register_listener(entity, listener, subscription);
        true
    }

    /// The behavior registry.
    #[must_use]
    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    // -- Frame --

    /// Handle for queueing structural changes.
    #[must_use]
    pub fn commands(&self) -> CommandQueue {
        Rc::clone(&self.commands)
    }

    /// Queue a structural change.
    pub fn queue(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }

    /// Run every attached behavior once.
    pub fn update(&self, dt: f32) {
        for (owner, behavior) in self.behaviors.behaviors() {
            behavior.update(self, owner, dt);
        }
    }

    /// Apply queued commands until none are left.
    ///
    /// Returns the number of commands applied.
    pub fn flush(&mut self) -> usize {
        let mut applied = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let pending = std::mem::take(&mut *self.commands.borrow_mut());
            if pending.is_empty() {
                return applied;
            }
            for command in pending {
                self.apply(command);
                applied += 1;
            }
        }
        let left = self.commands.borrow().len();
        warn!(left, "command flush did not settle, deferring the rest");
        applied
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Spawn {
                origin,
                offset,
                labels,
                announce,
            } => {
                let position = self.position(origin).map(|p| p.translated(offset));
                let entity = self.spawn(position);
                {
                    let mut registry = self.labels_mut();
                    for label in &labels {
                        registry.add_label(entity, label);
                    }
                }
                if let Some(emit) = announce {
                    emit.fire(&self.bus, origin, Some(entity), Some(entity));
                }
            }
            Command::Despawn(entity) => {
                self.despawn(entity);
            }
        }
    }
}

impl Locate for World {
    fn locate(&self, entity: Entity) -> Option<Vec3> {
        self.positions.get(&entity).map(|p| p.0)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("channels", &self.catalog.len())
            .field("behaviors", &self.behaviors)
            .field("pending_commands", &self.commands.borrow().len())
            .finish_non_exhaustive()
    }
}
