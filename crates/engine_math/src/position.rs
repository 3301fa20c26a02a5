//! World-space positions and distance tests.
//!
//! Radius checks are inclusive: a point lying exactly on the boundary counts
//! as inside.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A world-space position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position(pub Vec3);

impl Position {
    /// The world origin.
    pub const ORIGIN: Self = Self(Vec3::ZERO);

    /// Create a position from its coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Position) -> f32 {
        self.0.distance(other.0)
    }

    /// Returns `true` if `other` is no further than `radius` away.
    #[must_use]
    pub fn is_within(self, other: Position, radius: f32) -> bool {
        within_radius(self.0, other.0, radius)
    }

    /// Translate the position by the given offset.
    #[must_use]
    pub fn translated(self, offset: Vec3) -> Self {
        Self(self.0 + offset)
    }
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Self(v)
    }
}

impl From<Position> for Vec3 {
    fn from(p: Position) -> Self {
        p.0
    }
}

/// Inclusive radius test between two points.
///
/// A negative or NaN radius matches nothing.
#[must_use]
pub fn within_radius(a: Vec3, b: Vec3, radius: f32) -> bool {
    if radius.is_nan() || radius < 0.0 {
        return false;
    }
    a.distance_squared(b) <= radius * radius
}
