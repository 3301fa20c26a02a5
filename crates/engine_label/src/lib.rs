//! # engine_label
//!
//! A multi-label index over entities. The host's built-in tag is a single
//! string per entity; behaviors need many, so this registry keeps its own
//! `entity ↔ labels` mapping in both directions.
//!
//! This crate provides:
//!
//! - [`LabelRegistry`]: add/remove labels, purge entities, membership queries.
//! - [`Locate`]: the entity → position lookup that radius queries need.
//! - [`SharedLabels`]: the single-threaded shared handle the event bus and
//!   behaviors hold.

pub mod registry;
pub mod spatial;

pub use registry::{LabelRegistry, SharedLabels};
pub use spatial::Locate;
