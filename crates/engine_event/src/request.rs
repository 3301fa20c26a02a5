//! Dispatch targeting.

use engine_component::Entity;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// How the bus narrows a channel's subscribers for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// Every subscriber of the channel.
    #[default]
    All,
    /// Subscribers owned by the dispatching behavior's own entity.
    Owner,
    /// Subscribers owned by an explicit entity, e.g. the other party in a collision.
    Other,
    /// Subscribers whose owner carries at least one of the request's labels.
    Tags,
}

/// One dispatch, built by the dispatching behavior and consumed by the bus.
///
/// A mode whose input is missing (no `source` for [`TargetMode::Owner`], no
/// `target` for [`TargetMode::Other`]) resolves to no subscribers.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// The channel being dispatched.
    pub channel: Channel,
    /// Target resolution rule.
    pub mode: TargetMode,
    /// The entity that caused the event, if any.
    pub activator: Option<Entity>,
    /// The dispatching behavior's own entity.
    pub source: Option<Entity>,
    /// Explicit target entity for [`TargetMode::Other`].
    pub target: Option<Entity>,
    /// Labels for [`TargetMode::Tags`]. An empty list matches every subscriber.
    pub labels: Vec<String>,
}

impl DispatchRequest {
    /// Create a request with no activator, source, target or labels.
    #[must_use]
    pub fn new(channel: Channel, mode: TargetMode) -> Self {
        Self {
            channel,
            mode,
            activator: None,
            source: None,
            target: None,
            labels: Vec::new(),
        }
    }

    /// Set the activator passed to every listener.
    #[must_use]
    pub fn activator(mut self, activator: impl Into<Option<Entity>>) -> Self {
        self.activator = activator.into();
        self
    }

    /// Set the dispatching behavior's entity.
    #[must_use]
    pub fn source(mut self, source: Entity) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the explicit target entity.
    #[must_use]
    pub fn target(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the label list.
    #[must_use]
    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}
