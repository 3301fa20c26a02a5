//! # engine_math
//!
//! Math types for the gameplay event engine. Re-exports [`glam`] for linear
//! algebra and defines the [`Position`] spatial type used by radius queries.

pub mod position;

// Re-export glam types for convenience.
pub use glam::Vec3;

pub use position::{Position, within_radius};
