//! Gameplay behaviors.
//!
//! Behaviors never reference each other. Event-driven ones implement
//! [`Listener`](engine_event::Listener) and are subscribed through
//! [`World::subscribe`]; polling ones implement [`Behavior`] and are attached
//! with [`World::attach`]. Either kind reports what it detected by firing an
//! [`Emit`].

mod counter;
mod destroyer;
mod proximity;
mod spawner;
mod timer;

pub use counter::Counter;
pub use destroyer::{DestroyTarget, Destroyer};
pub use proximity::ProximityTrigger;
pub use spawner::Spawner;
pub use timer::Timer;

use engine_component::Entity;
use engine_event::{Channel, DispatchRequest, EventBus, TargetMode};

use crate::world::World;

/// A behavior that runs once per frame.
pub trait Behavior {
    /// Advance by `dt` seconds on behalf of `owner`.
    fn update(&self, world: &World, owner: Entity, dt: f32);
}

/// The outgoing event a behavior is configured to fire.
#[derive(Debug, Clone)]
pub struct Emit {
    /// Channel to dispatch.
    pub channel: Channel,
    /// How subscribers are targeted.
    pub mode: TargetMode,
    /// Labels for [`TargetMode::Tags`].
    pub labels: Vec<String>,
}

impl Emit {
    /// Fire `channel` with `mode` and no labels.
    #[must_use]
    pub fn new(channel: Channel, mode: TargetMode) -> Self {
        Self {
            channel,
            mode,
            labels: Vec::new(),
        }
    }

    /// Set the labels used by [`TargetMode::Tags`].
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Build the request fired by `source`. `other` is the explicit target
    /// used by [`TargetMode::Other`].
    #[must_use]
    pub fn request(
        &self,
        source: Entity,
        activator: Option<Entity>,
        other: Option<Entity>,
    ) -> DispatchRequest {
        let mut request = DispatchRequest::new(self.channel.clone(), self.mode)
            .source(source)
            .activator(activator)
            .labels(self.labels.iter().cloned());
        request.target = other;
        request
    }

    /// Dispatch on `bus`, returning the number of listeners reached.
    pub fn fire(
        &self,
        bus: &EventBus,
        source: Entity,
        activator: Option<Entity>,
        other: Option<Entity>,
    ) -> usize {
        bus.dispatch(&self.request(source, activator, other))
    }
}
