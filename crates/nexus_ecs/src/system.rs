//! Systems and the sequential pipeline.
//!
//! A [`System`] wraps an update closure with an optional setup closure that
//! runs exactly once per world (tracked by the world's instance id) before
//! the first update. After every update the system commits the world's
//! deferred query removals, so iteration inside the update saw a stable
//! dense snapshot and removals take effect between steps.
//!
//! A [`Pipeline`] runs systems strictly sequentially in composition order,
//! threading the same `(world, dt)` through each. There is no parallel
//! execution and no reordering.

use std::collections::HashSet;

use tracing::trace;
use uuid::Uuid;

use crate::world::World;

type SetupFn = Box<dyn FnMut(&mut World)>;
type UpdateFn = Box<dyn FnMut(&mut World, f64)>;

/// A named update function with optional once-per-world setup.
pub struct System {
    name: String,
    setup: Option<SetupFn>,
    update: UpdateFn,
    initialized: HashSet<Uuid>,
}

impl System {
    /// A system with only an update function.
    #[must_use]
    pub fn new(name: impl Into<String>, update: impl FnMut(&mut World, f64) + 'static) -> Self {
        Self {
            name: name.into(),
            setup: None,
            update: Box::new(update),
            initialized: HashSet::new(),
        }
    }

    /// A system with a setup function run once per world before the first
    /// update against that world.
    #[must_use]
    pub fn with_setup(
        name: impl Into<String>,
        setup: impl FnMut(&mut World) + 'static,
        update: impl FnMut(&mut World, f64) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            setup: Some(Box::new(setup)),
            update: Box::new(update),
            initialized: HashSet::new(),
        }
    }

    /// The system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one step: setup on first contact with this world, then update,
    /// then the batched query-removal commit.
    pub fn run(&mut self, world: &mut World, dt: f64) {
        if self.initialized.insert(world.id()) {
            if let Some(setup) = &mut self.setup {
                trace!(system = %self.name, "running one-time setup");
                setup(world);
            }
        }
        (self.update)(world, dt);
        world.commit_removals();
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("has_setup", &self.setup.is_some())
            .finish()
    }
}

/// An ordered sequence of systems run once per tick.
#[derive(Debug, Default)]
pub struct Pipeline {
    systems: Vec<System>,
}

impl Pipeline {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system, builder-style.
    #[must_use]
    pub fn with(mut self, system: System) -> Self {
        self.systems.push(system);
        self
    }

    /// Append a system.
    pub fn push(&mut self, system: System) {
        self.systems.push(system);
    }

    /// Number of composed systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether the pipeline holds no systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Run every system in composition order against the same world.
    pub fn run(&mut self, world: &mut World, dt: f64) {
        for system in &mut self.systems {
            trace!(system = %system.name, "running system");
            system.run(world, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::query::QuerySpec;
    use crate::schema::ComponentSchema;

    #[test]
    fn test_setup_runs_once_per_world() {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let mut system = System::with_setup(
            "counter",
            move |_world| *c.borrow_mut() += 1,
            |_world, _dt| {},
        );

        let mut world_a = World::new();
        let mut world_b = World::new();
        system.run(&mut world_a, 0.016);
        system.run(&mut world_a, 0.016);
        assert_eq!(*count.borrow(), 1);
        system.run(&mut world_b, 0.016);
        assert_eq!(*count.borrow(), 2, "setup runs once for each world");
    }

    #[test]
    fn test_removals_commit_after_update_returns() {
        let mut world = World::new();
        let position = world
            .register_component(ComponentSchema::tag("position"))
            .unwrap();
        let q = world.register_query(QuerySpec::new().with("position")).unwrap();

        let e = world.create();
        world.add_component(e, position).unwrap();

        let mut system = System::new("detach", move |world: &mut World, _dt| {
            world.remove_component(e, position).unwrap();
            // Mid-step the dense snapshot is unchanged.
            assert_eq!(world.query(q).unwrap(), &[e]);
        });
        system.run(&mut world, 0.016);
        // After the step the removal has been committed.
        assert!(world.query(q).unwrap().is_empty());
    }

    #[test]
    fn test_pipeline_runs_in_composition_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&order), Rc::clone(&order));
        let mut pipeline = Pipeline::new()
            .with(System::new("first", move |_w, _dt| a.borrow_mut().push(1)))
            .with(System::new("second", move |_w, _dt| b.borrow_mut().push(2)));

        let mut world = World::new();
        pipeline.run(&mut world, 0.016);
        pipeline.run(&mut world, 0.016);
        assert_eq!(*order.borrow(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_later_system_sees_transitions_from_earlier_one() {
        let mut world = World::new();
        let marker = world.register_component(ComponentSchema::tag("marker")).unwrap();
        let q = world.register_query(QuerySpec::new().with("marker")).unwrap();

        let seen = Rc::new(RefCell::new(0usize));
        let seen_in_second = Rc::clone(&seen);

        let mut pipeline = Pipeline::new()
            .with(System::new("spawn", move |world: &mut World, _dt| {
                let e = world.create();
                world.add_component(e, marker).unwrap();
            }))
            .with(System::new("observe", move |world: &mut World, _dt| {
                *seen_in_second.borrow_mut() += world.drain_entered(q).unwrap().len();
            }));

        pipeline.run(&mut world, 0.016);
        assert_eq!(*seen.borrow(), 1);
    }
}
