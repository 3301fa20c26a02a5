//! Listener-side acceptance filters.
//!
//! The bus decides who is *told* about an event; an [`Acceptance`] decides
//! whether the told listener *acts*. The two are configured independently, so
//! one channel can serve listeners that each care about different activators.

use std::cell::Cell;

use engine_component::Entity;
use engine_label::LabelRegistry;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ListenerError;
use crate::listener::{Event, Listener};

/// Predicate a listener applies to the activator of each delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Acceptance {
    /// React to any delivery, with or without an activator.
    #[default]
    Any,
    /// React only when the activator is the subscription's own entity.
    Owner,
    /// React only when the activator is this entity.
    Entity(Entity),
    /// React only when the activator carries one of these labels. An empty
    /// list accepts any activator.
    Labels(Vec<String>),
}

impl Acceptance {
    /// Returns `true` if a listener owned by `owner` should act on `activator`.
    ///
    /// Every variant except [`Acceptance::Any`] rejects a missing activator.
    #[must_use]
    pub fn accepts(&self, activator: Option<Entity>, owner: Entity, labels: &LabelRegistry) -> bool {
        match (self, activator) {
            (Self::Any, _) => true,
            (_, None) => false,
            (Self::Owner, Some(a)) => a == owner,
            (Self::Entity(e), Some(a)) => a == *e,
            (Self::Labels(list), Some(a)) => labels.has_any_label(a, list),
        }
    }
}

/// A listener made of an [`Acceptance`] filter and an effect closure.
///
/// The effect runs only for accepted deliveries. [`Filtered::runs`] counts how
/// often that happened.
pub struct Filtered<F> {
    acceptance: Acceptance,
    effect: F,
    runs: Cell<usize>,
}

impl<F> Filtered<F>
where
    F: Fn(&Event<'_>) -> Result<(), ListenerError>,
{
    /// Wrap `effect` behind `acceptance`.
    pub fn new(acceptance: Acceptance, effect: F) -> Self {
        Self {
            acceptance,
            effect,
            runs: Cell::new(0),
        }
    }

    /// Returns the filter.
    #[must_use]
    pub fn acceptance(&self) -> &Acceptance {
        &self.acceptance
    }

    /// Returns how many deliveries passed the filter.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.get()
    }
}

impl<F> Listener for Filtered<F>
where
    F: Fn(&Event<'_>) -> Result<(), ListenerError>,
{
    fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
        let accepted = self
            .acceptance
            .accepts(event.activator, event.owner, &event.labels());
        if !accepted {
            trace!(channel = %event.channel, owner = %event.owner, "delivery declined by filter");
            return Ok(());
        }
        self.runs.set(self.runs.get() + 1);
        (self.effect)(event)
    }

    fn name(&self) -> &'static str {
        "filtered"
    }
}

impl<F> std::fmt::Debug for Filtered<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filtered")
            .field("acceptance", &self.acceptance)
            .field("runs", &self.runs.get())
            .finish_non_exhaustive()
    }
}
