//! Entity identifiers and allocation.
//!
//! An [`Entity`] is a lightweight `u32` with no inherent data; existence is
//! defined solely by membership in the allocator's live set. Destroyed ids
//! are pushed onto a freelist and handed out again before the monotonic
//! cursor advances, so id values stay dense.
//!
//! Each world owns its own allocator — there is no process-global id space.

use serde::{Deserialize, Serialize};

/// A unique entity identifier within one world.
///
/// Entities are pure identifiers; components attached to them give them
/// meaning. The raw value doubles as the row index into every component
/// store and bitmask column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u32);

impl Entity {
    /// Create an entity from a raw `u32` identifier.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw `u32` identifier.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Row index into per-entity storage.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates and recycles entity ids for one world.
///
/// Destroyed ids are reused from the freelist before the cursor advances.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    cursor: u32,
    free: Vec<Entity>,
    alive: Vec<bool>,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an entity id: a recycled one if available, else the next
    /// monotonic value.
    pub fn allocate(&mut self) -> Entity {
        let entity = match self.free.pop() {
            Some(e) => e,
            None => {
                let e = Entity(self.cursor);
                self.cursor += 1;
                e
            }
        };
        if entity.index() >= self.alive.len() {
            self.alive.resize(entity.index() + 1, false);
        }
        self.alive[entity.index()] = true;
        entity
    }

    /// Release an entity id back to the freelist.
    ///
    /// Returns `false` if the entity was not alive (already released or
    /// never allocated).
    pub fn release(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.alive[entity.index()] = false;
        self.free.push(entity);
        true
    }

    /// Whether the entity is currently allocated.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Number of currently live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Highest id ever handed out, plus one. Bounds iteration over rows.
    #[must_use]
    pub fn high_water(&self) -> u32 {
        self.cursor
    }

    /// Iterate over all live entities in id order.
    pub fn live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| Entity(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_sequential_ids() {
        let mut alloc = EntityAllocator::new();
        assert_eq!(alloc.allocate().id(), 0);
        assert_eq!(alloc.allocate().id(), 1);
        assert_eq!(alloc.allocate().id(), 2);
        assert_eq!(alloc.live_count(), 3);
    }

    #[test]
    fn test_released_ids_are_recycled() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(alloc.release(a));
        let c = alloc.allocate();
        assert_eq!(c, a, "freelist id should be reused before the cursor");
        assert!(alloc.is_alive(b));
        assert!(alloc.is_alive(c));
    }

    #[test]
    fn test_double_release_is_rejected() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.release(e));
        assert!(!alloc.release(e));
        assert!(!alloc.release(Entity::from_raw(99)));
    }

    #[test]
    fn test_live_iteration_skips_released() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        alloc.release(b);
        let live: Vec<Entity> = alloc.live().collect();
        assert_eq!(live, vec![a, c]);
    }
}
