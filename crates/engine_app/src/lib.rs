//! # engine_app
//!
//! The simulation side of the engine: a [`World`] that owns every entity,
//! its position, labels and event subscriptions; a set of gameplay
//! [`behaviors`] that talk to each other only through the event bus and the
//! label registry; and a fixed-timestep [`TickLoop`] that drives them.
//!
//! ## Frame
//!
//! 1. Every attached [`Behavior`] is updated. Updates may dispatch events.
//! 2. Structural changes requested during the frame (spawns, despawns) are
//!    applied from the world's command queue.
//! 3. The tick counter advances.

pub mod behaviors;
pub mod config;
pub mod error;
pub mod registry;
pub mod tick;
pub mod world;

pub use behaviors::{Behavior, Emit};
pub use config::SceneConfig;
pub use error::SceneError;
pub use tick::{TickConfig, TickLoop};
pub use world::{Command, CommandQueue, World};
