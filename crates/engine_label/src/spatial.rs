//! Radius-bounded label queries.
//!
//! The registry does not own positions. Callers pass a [`Locate`] view of
//! their world so the query can combine label membership with distance.

use std::collections::HashMap;

use engine_component::Entity;
use engine_math::{Position, Vec3, within_radius};

use crate::registry::LabelRegistry;

/// Entity → position lookup supplied by the caller's world.
pub trait Locate {
    /// Returns the world-space position of `entity`, or `None` if it has none.
    fn locate(&self, entity: Entity) -> Option<Vec3>;
}

impl Locate for HashMap<Entity, Position> {
    fn locate(&self, entity: Entity) -> Option<Vec3> {
        self.get(&entity).map(|p| p.0)
    }
}

impl Locate for HashMap<Entity, Vec3> {
    fn locate(&self, entity: Entity) -> Option<Vec3> {
        self.get(&entity).copied()
    }
}

impl LabelRegistry {
    /// Bearers of `label` within `radius` of `origin`, boundary inclusive.
    ///
    /// At most `max_count` entities are returned; `0` means unlimited. The
    /// origin itself is never part of the result, and neither is any entity
    /// `locate` has no position for. Results are in no particular order.
    #[must_use]
    pub fn find_in_radius(
        &self,
        origin: Entity,
        radius: f32,
        max_count: usize,
        label: &str,
        locate: &dyn Locate,
    ) -> Vec<Entity> {
        let Some(center) = locate.locate(origin) else {
            return Vec::new();
        };
        let limit = if max_count == 0 { usize::MAX } else { max_count };

        self.bearers(label)
            .filter(|&e| e != origin)
            .filter(|&e| {
                locate
                    .locate(e)
                    .is_some_and(|p| within_radius(center, p, radius))
            })
            .take(limit)
            .collect()
    }
}
