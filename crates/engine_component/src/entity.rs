//! Entity handles and allocation.
//!
//! An [`Entity`] is a lightweight `(index, generation)` pair. The index names
//! a slot in the [`EntityAllocator`]; the generation distinguishes successive
//! occupants of that slot so a handle to a destroyed entity can never be
//! mistaken for the entity that later reuses the slot.

use serde::{Deserialize, Serialize};

/// A generational entity handle.
///
/// Entities are pure identifiers. Behaviors, labels and subscriptions refer to
/// an entity only through this handle and never own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// The null / invalid entity sentinel. No allocator ever reports it alive.
    pub const INVALID: Entity = Entity {
        index: u32::MAX,
        generation: 0,
    };

    /// Create an entity handle from its raw parts.
    #[must_use]
    pub const fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns `true` unless this is [`Entity::INVALID`].
    ///
    /// This says nothing about liveness; use [`EntityAllocator::is_alive`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.index != u32::MAX
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Issues entity handles from a recycled slot table.
///
/// Freed slots go on a free list and are handed out again with their
/// generation bumped.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity handle, reusing a freed slot when one exists.
    pub fn allocate(&mut self) -> Entity {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return Entity::from_raw_parts(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        Entity::from_raw_parts(index, 0)
    }

    /// Frees an entity's slot.
    ///
    /// Returns `false` if the handle is stale, invalid, or was never issued.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.index);
        self.live -= 1;
        true
    }

    /// Returns `true` if the handle refers to the current occupant of a live slot.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns an iterator over every live entity.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::from_raw_parts(index as u32, slot.generation))
    }
}
