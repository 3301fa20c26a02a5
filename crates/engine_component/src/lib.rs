//! # engine_component
//!
//! Entity identity for the gameplay event engine.
//!
//! This crate provides:
//!
//! - [`Entity`]: a copyable `(index, generation)` handle with no data of its own.
//! - [`EntityAllocator`]: a slot map that issues, recycles and validates handles.
//!
//! Handles are weak by construction: destroying an entity bumps its slot's
//! generation, so every outstanding copy of the old handle stops matching
//! anything the allocator considers alive.

pub mod entity;

pub use entity::{Entity, EntityAllocator};
