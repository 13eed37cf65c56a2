//! The [`World`]: entity allocation, component stores, bitmask membership,
//! and registered query state, aggregated into the unit of composition every
//! other part of the substrate operates on.
//!
//! Component membership is tracked in per-generation bitmask columns: one
//! `u32` word per entity per block of 32 registered component types. A
//! component's `(generation, bit)` location is computed once at registration,
//! so membership tests are a single mask-and-compare per generation.
//!
//! Capacity is dynamic: allocating past the current capacity doubles it,
//! reallocating every store lane, mask column, sparse index, and shadow
//! buffer while preserving existing rows.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::change::{self, WatchState, WatchedComponent};
use crate::entity::{Entity, EntityAllocator};
use crate::query::{entity_matches, QueryId, QuerySpec, QueryState};
use crate::schema::{ComponentSchema, SchemaError};
use crate::store::{ColumnStore, FieldSlot, LaneScalar};

/// Default entity capacity for a fresh world. Storage grows on demand.
const DEFAULT_CAPACITY: usize = 64;

/// Handle to a component type registered with a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ComponentId(pub u32);

impl ComponentId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resolved reference to one field of one component type. Resolve once
/// with [`World::field`], then read/write by entity without string lookups.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef {
    pub component: ComponentId,
    slot: FieldSlot,
}

/// Runtime errors from world operations.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("entity {0} not found")]
    EntityNotFound(Entity),
    #[error("unknown query: {0:?}")]
    UnknownQuery(QueryId),
    #[error("query {0:?} watches no components")]
    NotWatching(QueryId),
    #[error("type mismatch accessing field of component {0:?}")]
    FieldType(ComponentId),
}

/// Everything the world knows about one registered component type.
#[derive(Debug)]
pub(crate) struct ComponentInfo {
    pub(crate) schema: ComponentSchema,
    pub(crate) store: ColumnStore,
    slots: Vec<FieldSlot>,
    generation: usize,
    bit: u32,
}

/// Entity registry, component stores, bitmasks, and query state for one
/// independent simulation.
///
/// Each world owns its own entity id space and a `uuid` instance id used by
/// the scheduler's once-per-world setup tracking.
#[derive(Debug)]
pub struct World {
    id: Uuid,
    allocator: EntityAllocator,
    capacity: usize,
    components: Vec<ComponentInfo>,
    by_name: HashMap<String, ComponentId>,
    /// One mask column per generation; each column holds one word per entity.
    masks: Vec<Vec<u32>>,
    queries: Vec<QueryState>,
    /// Change-detection state, parallel to `queries`.
    watches: Vec<Option<WatchState>>,
    /// Queries that accumulated deferred removals this step.
    dirty: Vec<QueryId>,
}

impl World {
    /// Create a world with the default starting capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a world sized for `capacity` entities. Capacity still grows
    /// on demand.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            allocator: EntityAllocator::new(),
            capacity: capacity.max(1),
            components: Vec::new(),
            by_name: HashMap::new(),
            masks: Vec::new(),
            queries: Vec::new(),
            watches: Vec::new(),
            dirty: Vec::new(),
        }
    }

    /// This world's instance id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current entity capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// Iterate over all live entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.live()
    }

    // -- Component registration --

    /// Register a component type. Validates the schema, allocates columnar
    /// storage sized to the current capacity, and assigns the component's
    /// bitmask location. Fails immediately on an invalid or duplicate
    /// schema.
    pub fn register_component(
        &mut self,
        schema: ComponentSchema,
    ) -> Result<ComponentId, SchemaError> {
        schema.validate()?;
        if self.by_name.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateComponent(schema.name));
        }

        let id = ComponentId(self.components.len() as u32);
        let generation = id.index() / 32;
        let bit = 1u32 << (id.index() % 32);
        if generation == self.masks.len() {
            self.masks.push(vec![0; self.capacity]);
        }

        let (store, slots) = ColumnStore::new(&schema, self.capacity);
        debug!(
            component = %schema.name,
            id = id.0,
            generation,
            fields = schema.fields.len(),
            tag = schema.is_tag(),
            "registered component"
        );
        self.by_name.insert(schema.name.clone(), id);
        self.components.push(ComponentInfo {
            schema,
            store,
            slots,
            generation,
            bit,
        });
        Ok(id)
    }

    /// Look up a component id by name.
    #[must_use]
    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Resolve a field reference by component and field name.
    pub fn field(&self, component: &str, field: &str) -> Result<FieldRef, SchemaError> {
        let id = self
            .component_id(component)
            .ok_or_else(|| SchemaError::UnknownComponent(component.to_string()))?;
        let info = &self.components[id.index()];
        if info.schema.is_tag() {
            return Err(SchemaError::TagHasNoFields(component.to_string()));
        }
        let idx = info
            .schema
            .fields
            .iter()
            .position(|f| f.name == field)
            .ok_or_else(|| SchemaError::UnknownField {
                component: component.to_string(),
                field: field.to_string(),
            })?;
        Ok(FieldRef {
            component: id,
            slot: info.slots[idx],
        })
    }

    // -- Entity lifecycle --

    /// Create an entity: a recycled id when one is free, else the next
    /// monotonic id, growing storage when the id space outruns capacity.
    ///
    /// Exclusion-style queries (no required components) are re-evaluated
    /// immediately — an entity with zero components can already match them.
    pub fn create(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        if entity.index() >= self.capacity {
            let new_capacity = (self.capacity * 2).max(entity.index() + 1);
            self.grow(new_capacity);
        }
        for query in &mut self.queries {
            if query.is_exclusion_only()
                && entity_matches(&self.masks, &query.required, &query.excluded, entity.index())
            {
                query.insert(entity);
            }
        }
        trace!(entity = entity.id(), "created entity");
        entity
    }

    /// Destroy an entity: evict it from every query it matches (feeding
    /// their exited logs), clear its bitmask row in every generation, and
    /// recycle the id. A no-op if the entity is already absent.
    pub fn destroy(&mut self, entity: Entity) {
        if !self.allocator.release(entity) {
            trace!(entity = entity.id(), "destroy of absent entity ignored");
            return;
        }
        for (i, query) in self.queries.iter_mut().enumerate() {
            if query.contains(entity) {
                let was_clean = !query.has_pending_removals();
                query.schedule_remove(entity);
                if was_clean && query.has_pending_removals() {
                    self.dirty.push(QueryId(i as u32));
                }
            }
        }
        for column in &mut self.masks {
            column[entity.index()] = 0;
        }
        trace!(entity = entity.id(), "destroyed entity");
    }

    /// Whether the entity is currently alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    // -- Component membership --

    /// Attach a component to an entity and re-test every interested query.
    /// Attaching an already-present component is a no-op.
    pub fn add_component(&mut self, entity: Entity, component: ComponentId) -> Result<(), WorldError> {
        if !self.allocator.is_alive(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        let info = &self.components[component.index()];
        let (generation, bit) = (info.generation, info.bit);
        let word = &mut self.masks[generation][entity.index()];
        if *word & bit != 0 {
            return Ok(());
        }
        *word |= bit;
        self.retest_queries(entity, generation, bit);
        Ok(())
    }

    /// Detach a component from an entity, keeping its stored values.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<(), WorldError> {
        self.remove_component_inner(entity, component, false)
    }

    /// Detach a component and zero its storage slot for this entity.
    pub fn remove_component_reset(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<(), WorldError> {
        self.remove_component_inner(entity, component, true)
    }

    fn remove_component_inner(
        &mut self,
        entity: Entity,
        component: ComponentId,
        reset: bool,
    ) -> Result<(), WorldError> {
        if !self.allocator.is_alive(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        let info = &mut self.components[component.index()];
        let (generation, bit) = (info.generation, info.bit);
        if reset {
            info.store.reset_slot(entity.index());
        }
        let word = &mut self.masks[generation][entity.index()];
        if *word & bit == 0 {
            return Ok(());
        }
        *word &= !bit;
        self.retest_queries(entity, generation, bit);
        Ok(())
    }

    /// Whether the entity currently carries the component.
    #[must_use]
    pub fn has_component(&self, entity: Entity, component: ComponentId) -> bool {
        let info = &self.components[component.index()];
        self.masks[info.generation]
            .get(entity.index())
            .is_some_and(|word| word & info.bit != 0)
    }

    /// Re-test every query interested in `(generation, bit)` against one
    /// entity's current mask row.
    fn retest_queries(&mut self, entity: Entity, generation: usize, bit: u32) {
        for (i, query) in self.queries.iter_mut().enumerate() {
            if !query.interested_in(generation, bit) {
                continue;
            }
            let matches =
                entity_matches(&self.masks, &query.required, &query.excluded, entity.index());
            if matches {
                query.insert(entity);
            } else if query.contains(entity) {
                let was_clean = !query.has_pending_removals();
                query.schedule_remove(entity);
                if was_clean && query.has_pending_removals() {
                    self.dirty.push(QueryId(i as u32));
                }
            }
        }
    }

    // -- Field access --

    /// Read one scalar field value.
    pub fn get<T: LaneScalar>(&self, field: FieldRef, entity: Entity) -> Result<T, WorldError> {
        if !self.allocator.is_alive(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        self.components[field.component.index()]
            .store
            .get::<T>(field.slot, entity.index())
            .ok_or(WorldError::FieldType(field.component))
    }

    /// Write one scalar field value.
    pub fn set<T: LaneScalar>(
        &mut self,
        field: FieldRef,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        if !self.allocator.is_alive(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        if self.components[field.component.index()]
            .store
            .set::<T>(field.slot, entity.index(), value)
        {
            Ok(())
        } else {
            Err(WorldError::FieldType(field.component))
        }
    }

    /// Read a fixed-length array field as a slice.
    pub fn get_slice<T: LaneScalar>(
        &self,
        field: FieldRef,
        entity: Entity,
    ) -> Result<&[T], WorldError> {
        if !self.allocator.is_alive(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        self.components[field.component.index()]
            .store
            .slice::<T>(field.slot, entity.index())
            .ok_or(WorldError::FieldType(field.component))
    }

    /// Mutable access to a fixed-length array field.
    pub fn slice_mut<T: LaneScalar>(
        &mut self,
        field: FieldRef,
        entity: Entity,
    ) -> Result<&mut [T], WorldError> {
        if !self.allocator.is_alive(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        self.components[field.component.index()]
            .store
            .slice_mut::<T>(field.slot, entity.index())
            .ok_or(WorldError::FieldType(field.component))
    }

    // -- Queries --

    /// Compile a query spec against this world. Unknown component names are
    /// a configuration error. The dense set is seeded from all live
    /// entities; initial matches land in the entered log.
    pub fn register_query(&mut self, spec: QuerySpec) -> Result<QueryId, SchemaError> {
        let mut required = vec![0u32; self.masks.len()];
        let mut excluded = vec![0u32; self.masks.len()];
        for name in &spec.required {
            let info = self.info_by_name(name)?;
            required[info.generation] |= info.bit;
        }
        for name in &spec.excluded {
            let info = self.info_by_name(name)?;
            excluded[info.generation] |= info.bit;
        }

        let mut watched = Vec::with_capacity(spec.watched.len());
        for name in &spec.watched {
            let id = self
                .component_id(name)
                .ok_or_else(|| SchemaError::UnknownComponent(name.clone()))?;
            // The shadow starts as a copy of the live store so pre-existing
            // values are not reported as changes.
            watched.push(WatchedComponent {
                component: id,
                shadow: self.components[id.index()].store.clone(),
            });
        }

        let id = QueryId(self.queries.len() as u32);
        let mut state = QueryState::new(spec, required, excluded, self.capacity);
        for entity in self.allocator.live() {
            if entity_matches(&self.masks, &state.required, &state.excluded, entity.index()) {
                state.insert(entity);
            }
        }
        debug!(
            query = id.0,
            matched = state.entities().len(),
            watched = watched.len(),
            "registered query"
        );
        self.queries.push(state);
        self.watches.push(if watched.is_empty() {
            None
        } else {
            Some(WatchState::new(watched))
        });
        Ok(id)
    }

    fn info_by_name(&self, name: &str) -> Result<&ComponentInfo, SchemaError> {
        let id = self
            .component_id(name)
            .ok_or_else(|| SchemaError::UnknownComponent(name.to_string()))?;
        Ok(&self.components[id.index()])
    }

    /// The dense matched set of a query. Stable within a system step.
    pub fn query(&self, id: QueryId) -> Result<&[Entity], WorldError> {
        self.queries
            .get(id.index())
            .map(QueryState::entities)
            .ok_or(WorldError::UnknownQuery(id))
    }

    /// Return and clear the query's entered log.
    pub fn drain_entered(&mut self, id: QueryId) -> Result<Vec<Entity>, WorldError> {
        self.queries
            .get_mut(id.index())
            .map(QueryState::drain_entered)
            .ok_or(WorldError::UnknownQuery(id))
    }

    /// Return and clear the query's exited log.
    pub fn drain_exited(&mut self, id: QueryId) -> Result<Vec<Entity>, WorldError> {
        self.queries
            .get_mut(id.index())
            .map(QueryState::drain_exited)
            .ok_or(WorldError::UnknownQuery(id))
    }

    /// Scan a watching query for value changes since the last observation.
    /// With `clear` the changed list is recomputed fresh; without it,
    /// results accumulate. O(matched × watched fields).
    pub fn query_changed(&mut self, id: QueryId, clear: bool) -> Result<Vec<Entity>, WorldError> {
        let state = self
            .queries
            .get(id.index())
            .ok_or(WorldError::UnknownQuery(id))?;
        let watch = self
            .watches
            .get_mut(id.index())
            .ok_or(WorldError::UnknownQuery(id))?
            .as_mut()
            .ok_or(WorldError::NotWatching(id))?;
        Ok(change::scan(&self.components, state.entities(), watch, clear))
    }

    /// Flush every query's deferred removals. The scheduler calls this
    /// after each system step; removals only take effect between steps.
    pub fn commit_removals(&mut self) {
        for id in std::mem::take(&mut self.dirty) {
            self.queries[id.index()].commit_removals();
        }
    }

    // -- Growth --

    fn grow(&mut self, new_capacity: usize) {
        debug!(
            from = self.capacity,
            to = new_capacity,
            "growing world capacity"
        );
        for info in &mut self.components {
            info.store.resize(new_capacity);
        }
        for column in &mut self.masks {
            column.resize(new_capacity, 0);
        }
        for query in &mut self.queries {
            query.resize(new_capacity);
        }
        for watch in self.watches.iter_mut().flatten() {
            watch.resize(new_capacity);
        }
        self.capacity = new_capacity;
    }

    // -- Introspection --

    /// A JSON description of the world's registered components and queries,
    /// for tooling and debug dumps.
    #[must_use]
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "capacity": self.capacity,
            "entities": self.entity_count(),
            "components": self.components.iter().map(|info| {
                serde_json::json!({
                    "name": info.schema.name,
                    "tag": info.schema.is_tag(),
                    "fields": info.schema.fields.iter().map(|f| {
                        serde_json::json!({
                            "name": f.name,
                            "kind": format!("{:?}", f.kind),
                        })
                    }).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
            "queries": self.queries.iter().map(|q| {
                serde_json::json!({
                    "required": q.spec.required,
                    "excluded": q.spec.excluded,
                    "watched": q.spec.watched,
                    "matched": q.entities().len(),
                })
            }).collect::<Vec<_>>(),
        })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
