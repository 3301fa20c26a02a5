//! The listener contract.

use std::cell::Ref;

use engine_component::Entity;
use engine_label::LabelRegistry;

use crate::bus::EventBus;
use crate::channel::Channel;
use crate::error::ListenerError;

/// What a listener receives for one delivery.
#[derive(Debug)]
pub struct Event<'a> {
    /// The dispatched channel.
    pub channel: &'a Channel,
    /// The entity that caused the event, if any.
    pub activator: Option<Entity>,
    /// The entity that owns the receiving subscription.
    pub owner: Entity,
    /// The bus that delivered the event. Reactions may dispatch, register or
    /// unregister through it.
    pub bus: &'a EventBus,
}

impl Event<'_> {
    /// Borrow the label registry the bus resolves tags against.
    ///
    /// Drop the borrow before dispatching or mutating labels.
    #[must_use]
    pub fn labels(&self) -> Ref<'_, LabelRegistry> {
        self.bus.labels().borrow()
    }
}

/// A subscriber's reaction entry point.
///
/// Takes `&self`: deliveries can nest, so state that changes on delivery lives
/// behind `Cell`/`RefCell`.
pub trait Listener {
    /// React to a delivered event.
    ///
    /// # Errors
    ///
    /// An error is reported to the bus's diagnostic sink. It never reaches the
    /// dispatcher and never stops delivery to other listeners.
    fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError>;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
