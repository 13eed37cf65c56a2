//! Query specifications and compiled query state.
//!
//! A [`QuerySpec`] names the components an entity must have, must not have,
//! and which ones to watch for value changes. Registering a spec against a
//! world compiles it into a [`QueryState`]: per-generation bitmask words, a
//! dense/sparse matched-entity set, and entered/exited transition logs.
//!
//! Removals from the dense set are deferred onto a `to_remove` list and
//! flushed in one batched commit after each system step, so code iterating a
//! match snapshot mid-step never observes the dense array mutating.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Handle to a query registered with a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub u32);

impl QueryId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declarative description of a query: required, excluded, and watched
/// component names.
///
/// # Examples
///
/// ```rust
/// use nexus_ecs::QuerySpec;
///
/// let spec = QuerySpec::new()
///     .with("position")
///     .with("renderable")
///     .without("hidden")
///     .watch("position");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Components an entity must have to match.
    pub required: Vec<String>,
    /// Components an entity must not have.
    pub excluded: Vec<String>,
    /// Components whose per-field values are diffed by the changed scan.
    pub watched: Vec<String>,
}

impl QuerySpec {
    /// Create an empty spec. A spec with no required components matches any
    /// entity not carrying an excluded component.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a component.
    #[must_use]
    pub fn with(mut self, component: impl Into<String>) -> Self {
        self.required.push(component.into());
        self
    }

    /// Exclude a component.
    #[must_use]
    pub fn without(mut self, component: impl Into<String>) -> Self {
        self.excluded.push(component.into());
        self
    }

    /// Watch a component for value changes. Watched components are also
    /// required.
    #[must_use]
    pub fn watch(mut self, component: impl Into<String>) -> Self {
        let name: String = component.into();
        if !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.watched.push(name);
        self
    }
}

/// Tests an entity's mask row against required/excluded generation words.
///
/// An entity matches when every required bit is present and no excluded bit
/// is present, across every generation the query references.
#[must_use]
pub(crate) fn entity_matches(
    masks: &[Vec<u32>],
    required: &[u32],
    excluded: &[u32],
    row: usize,
) -> bool {
    for generation in 0..required.len().max(excluded.len()) {
        let word = masks
            .get(generation)
            .and_then(|column| column.get(row))
            .copied()
            .unwrap_or(0);
        let req = required.get(generation).copied().unwrap_or(0);
        let exc = excluded.get(generation).copied().unwrap_or(0);
        if word & req != req || word & exc != 0 {
            return false;
        }
    }
    true
}

/// Compiled, incrementally maintained query state.
#[derive(Debug)]
pub struct QueryState {
    /// The spec this state was compiled from.
    pub(crate) spec: QuerySpec,
    /// Required bits, one word per generation.
    pub(crate) required: Vec<u32>,
    /// Excluded bits, one word per generation.
    pub(crate) excluded: Vec<u32>,
    /// Matched entities, dense. Pending removals stay in here until the
    /// batched commit.
    dense: Vec<Entity>,
    /// Entity row -> index into `dense`, `usize::MAX` when absent.
    sparse: Vec<usize>,
    entered: Vec<Entity>,
    exited: Vec<Entity>,
    to_remove: Vec<Entity>,
}

const ABSENT: usize = usize::MAX;

impl QueryState {
    pub(crate) fn new(
        spec: QuerySpec,
        required: Vec<u32>,
        excluded: Vec<u32>,
        capacity: usize,
    ) -> Self {
        Self {
            spec,
            required,
            excluded,
            dense: Vec::new(),
            sparse: vec![ABSENT; capacity],
            entered: Vec::new(),
            exited: Vec::new(),
            to_remove: Vec::new(),
        }
    }

    /// Whether this query's outcome can change when `(generation, bit)`
    /// flips on some entity.
    #[must_use]
    pub(crate) fn interested_in(&self, generation: usize, bit: u32) -> bool {
        let req = self.required.get(generation).copied().unwrap_or(0);
        let exc = self.excluded.get(generation).copied().unwrap_or(0);
        (req | exc) & bit != 0
    }

    /// Whether the query has no required components (exclusion-style):
    /// a freshly created, component-less entity can match it.
    #[must_use]
    pub(crate) fn is_exclusion_only(&self) -> bool {
        self.required.iter().all(|w| *w == 0)
    }

    /// O(1) membership, including entities pending removal.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.sparse
            .get(entity.index())
            .is_some_and(|&slot| slot != ABSENT)
    }

    /// The dense matched set. Stable across a system step; removals land
    /// after the end-of-step commit.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    /// Record that `entity` now matches: append to the dense set and the
    /// entered log. A pending removal for the same entity is cancelled (it
    /// re-entered before the commit).
    pub(crate) fn insert(&mut self, entity: Entity) {
        if self.contains(entity) {
            if let Some(pos) = self.to_remove.iter().position(|e| *e == entity) {
                self.to_remove.swap_remove(pos);
                self.entered.push(entity);
            }
            return;
        }
        self.sparse[entity.index()] = self.dense.len();
        self.dense.push(entity);
        self.entered.push(entity);
    }

    /// Record that `entity` no longer matches: append to the exited log and
    /// schedule its removal from the dense set.
    pub(crate) fn schedule_remove(&mut self, entity: Entity) {
        if !self.contains(entity) || self.to_remove.contains(&entity) {
            return;
        }
        self.exited.push(entity);
        self.to_remove.push(entity);
    }

    /// Whether a batched commit has work to do.
    #[must_use]
    pub(crate) fn has_pending_removals(&self) -> bool {
        !self.to_remove.is_empty()
    }

    /// Flush scheduled removals out of the dense set (swap-remove, sparse
    /// indices patched).
    pub(crate) fn commit_removals(&mut self) {
        for entity in std::mem::take(&mut self.to_remove) {
            let slot = self.sparse[entity.index()];
            if slot == ABSENT {
                continue;
            }
            self.dense.swap_remove(slot);
            self.sparse[entity.index()] = ABSENT;
            if let Some(moved) = self.dense.get(slot) {
                self.sparse[moved.index()] = slot;
            }
        }
    }

    /// Return and clear the entered log.
    pub(crate) fn drain_entered(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.entered)
    }

    /// Return and clear the exited log.
    pub(crate) fn drain_exited(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.exited)
    }

    /// Grow the sparse index to a new entity capacity.
    pub(crate) fn resize(&mut self, capacity: usize) {
        self.sparse.resize(capacity, ABSENT);
    }
}
