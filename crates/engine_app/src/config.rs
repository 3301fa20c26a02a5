//! Scene configuration.
//!
//! A scene is a JSON document declaring the bus channels, the tick settings
//! and the entities to create with their labels and behaviors:
//!
//! ```json
//! {
//!   "tick": { "tick_rate": 60.0, "max_ticks": 120 },
//!   "bus": { "channels": ["Tick", "Spawned"] },
//!   "entities": [
//!     {
//!       "position": [0.0, 0.0, 0.0],
//!       "labels": ["spawner"],
//!       "behaviors": [
//!         { "type": "timer", "duration": 0.5, "repeat": true,
//!           "emit": { "channel": "Tick", "mode": "owner" } }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::rc::Rc;

use engine_component::Entity;
use engine_event::{Acceptance, BusConfig, Channel, TargetMode};
use engine_math::{Position, Vec3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::behaviors::{
    Behavior, Counter, DestroyTarget, Destroyer, Emit, ProximityTrigger, Spawner, Timer,
};
use crate::error::SceneError;
use crate::tick::TickConfig;
use crate::world::World;

/// A complete scene description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Tick loop settings.
    pub tick: TickConfig,
    /// Declared channels.
    pub bus: BusConfig,
    /// Entities created when the scene is built.
    pub entities: Vec<EntityConfig>,
}

/// One entity of a scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// World-space position, if the entity is placed.
    pub position: Option<[f32; 3]>,
    /// Labels attached at creation.
    pub labels: Vec<String>,
    /// Behaviors attached at creation.
    pub behaviors: Vec<BehaviorConfig>,
}

/// An outgoing event, by channel name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitConfig {
    /// Channel name; must be declared in the bus section.
    pub channel: String,
    /// Targeting mode.
    #[serde(default)]
    pub mode: TargetMode,
    /// Labels for the `tags` mode.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A behavior, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorConfig {
    /// See [`Counter`].
    Counter {
        /// Channel counted.
        listen: String,
        #[serde(default)]
        acceptance: Acceptance,
        /// Count at which `emit` fires (0 = never).
        #[serde(default)]
        target: u32,
        #[serde(default)]
        reset: bool,
        emit: Option<EmitConfig>,
    },
    /// See [`Timer`].
    Timer {
        duration: f32,
        #[serde(default)]
        repeat: bool,
        emit: EmitConfig,
    },
    /// See [`ProximityTrigger`].
    Proximity {
        label: String,
        radius: f32,
        #[serde(default)]
        max_count: usize,
        emit: EmitConfig,
    },
    /// See [`Spawner`].
    Spawner {
        listen: String,
        #[serde(default)]
        acceptance: Acceptance,
        #[serde(default)]
        labels: Vec<String>,
        #[serde(default)]
        offset: [f32; 3],
        announce: Option<EmitConfig>,
    },
    /// See [`Destroyer`].
    Destroyer {
        listen: String,
        #[serde(default)]
        acceptance: Acceptance,
        #[serde(default)]
        target: DestroyTarget,
    },
}

impl SceneConfig {
    /// Parse a scene from JSON and validate its bus section.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Parse`] for malformed JSON,
    /// [`SceneError::Bus`] for invalid channel declarations and
    /// [`SceneError::InvalidTickRate`] for an unusable tick rate.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let config: Self = serde_json::from_str(json)?;
        config.bus.validate()?;
        config.tick.validate()?;
        Ok(config)
    }

    /// Create a world populated with this scene's entities.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownChannel`] if a behavior names a channel
    /// the bus section does not declare.
    pub fn build(&self) -> Result<World, SceneError> {
        let mut world = World::new(&self.bus);
        for (index, entity_config) in self.entities.iter().enumerate() {
            let position = entity_config.position.map(|[x, y, z]| Position::new(x, y, z));
            let entity = world.spawn(position);
            for label in &entity_config.labels {
                world.add_label(entity, label);
            }
            let resolver = Resolver {
                world: &world,
                entity: index,
            };
            let attachments = entity_config
                .behaviors
                .iter()
                .map(|b| resolver.attachment(b))
                .collect::<Result<Vec<_>, _>>()?;
            for attachment in attachments {
                match attachment {
                    Attachment::Behavior(behavior) => {
                        world.attach(entity, behavior);
                    }
                    Attachment::Listener(channel, listener) => {
                        listener.subscribe(&mut world, entity, &channel);
                    }
                }
            }
        }
        info!(
            entities = world.entity_count(),
            channels = world.catalog().len(),
            "scene built"
        );
        Ok(world)
    }
}

/// A behavior ready to hang on an entity.
enum Attachment {
    Behavior(Rc<dyn Behavior>),
    Listener(Channel, ListenerKind),
}

enum ListenerKind {
    Counter(Counter),
    Spawner(Spawner),
    Destroyer(Destroyer),
}

impl ListenerKind {
    fn subscribe(self, world: &mut World, entity: Entity, channel: &Channel) {
        match self {
            Self::Counter(l) => world.subscribe(entity, channel, Rc::new(l)),
            Self::Spawner(l) => world.subscribe(entity, channel, Rc::new(l)),
            Self::Destroyer(l) => world.subscribe(entity, channel, Rc::new(l)),
        };
    }
}

/// Resolves channel names against a world's catalog.
struct Resolver<'a> {
    world: &'a World,
    entity: usize,
}

impl Resolver<'_> {
    fn channel(&self, name: &str) -> Result<Channel, SceneError> {
        self.world
            .channel(name)
            .ok_or_else(|| SceneError::UnknownChannel {
                entity: self.entity,
                channel: name.to_owned(),
            })
    }

    fn emit(&self, config: &EmitConfig) -> Result<Emit, SceneError> {
        let channel = self.channel(&config.channel)?;
        Ok(Emit::new(channel, config.mode).with_labels(config.labels.iter().cloned()))
    }

    fn optional_emit(&self, config: Option<&EmitConfig>) -> Result<Option<Emit>, SceneError> {
        config.map(|c| self.emit(c)).transpose()
    }

    fn attachment(&self, config: &BehaviorConfig) -> Result<Attachment, SceneError> {
        let attachment = match config {
            BehaviorConfig::Counter {
                listen,
                acceptance,
                target,
                reset,
                emit,
            } => {
                let mut counter = Counter::new(acceptance.clone(), *target);
                if *reset {
                    counter = counter.resetting();
                }
                if let Some(emit) = self.optional_emit(emit.as_ref())? {
                    counter = counter.on_reached(emit);
                }
                Attachment::Listener(self.channel(listen)?, ListenerKind::Counter(counter))
            }
            BehaviorConfig::Timer {
                duration,
                repeat,
                emit,
            } => {
                let emit = self.emit(emit)?;
                let timer = if *repeat {
                    Timer::repeating(*duration, emit)
                } else {
                    Timer::once(*duration, emit)
                };
                Attachment::Behavior(Rc::new(timer))
            }
            BehaviorConfig::Proximity {
                label,
                radius,
                max_count,
                emit,
            } => {
                let trigger = ProximityTrigger::new(label.clone(), *radius, self.emit(emit)?)
                    .with_max_count(*max_count);
                Attachment::Behavior(Rc::new(trigger))
            }
            BehaviorConfig::Spawner {
                listen,
                acceptance,
                labels,
                offset,
                announce,
            } => {
                let mut spawner =
                    Spawner::new(acceptance.clone(), labels.iter().cloned(), self.world.commands())
                        .with_offset(Vec3::from_array(*offset));
                if let Some(emit) = self.optional_emit(announce.as_ref())? {
                    spawner = spawner.announce(emit);
                }
                Attachment::Listener(self.channel(listen)?, ListenerKind::Spawner(spawner))
            }
            BehaviorConfig::Destroyer {
                listen,
                acceptance,
                target,
            } => {
                let destroyer = Destroyer::new(acceptance.clone(), *target, self.world.commands());
                Attachment::Listener(self.channel(listen)?, ListenerKind::Destroyer(destroyer))
            }
        };
        Ok(attachment)
    }
}
