//! Bridge between the ECS world and the layout engine.
//!
//! Graph membership is expressed as plain components: a `graph_scene`
//! entity declares a layout group, `graph_node` entities join one, and
//! `graph_edge` entities connect two node entities. The bridge drains the
//! marker queries' entered/exited logs each step, mirrors the transitions
//! into [`LayoutEngine`] membership calls, ticks the physics, and writes
//! every tracked node's output position back into its `position` component.
//!
//! Run it as one system in the frame pipeline via [`layout_system`], or
//! call [`LayoutBridge::run`] directly when the caller owns the engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::error;

use nexus_ecs::{
    ComponentSchema, Entity, FieldRef, QueryId, QuerySpec, ScalarType, SchemaError, System, World,
    WorldError,
};

use crate::layout::LayoutEngine;

/// Component carrying a layout group id. Entities with this component
/// define the lifetime of one scene.
pub const SCENE: &str = "graph_scene";
/// Component marking an entity as a node of a scene's graph.
pub const NODE: &str = "graph_node";
/// Component declaring an edge between two node entities.
pub const EDGE: &str = "graph_edge";
/// Output component the bridge writes layout positions into.
pub const POSITION: &str = "position";

/// Resolved component/query handles plus the entity→key mirrors needed to
/// process exits after the source entity is already gone.
#[derive(Debug)]
pub struct LayoutBridge {
    scene_id: FieldRef,
    node_scene: FieldRef,
    edge_scene: FieldRef,
    edge_from: FieldRef,
    edge_to: FieldRef,
    pos_x: FieldRef,
    pos_y: FieldRef,
    scene_query: QueryId,
    node_query: QueryId,
    edge_query: QueryId,
    scenes: HashMap<Entity, u64>,
    nodes: HashMap<Entity, u64>,
    edges: HashMap<Entity, (u64, u64, u64)>,
}

impl LayoutBridge {
    /// Register the graph component schemas and marker queries with a
    /// world.
    pub fn register(world: &mut World) -> Result<Self, SchemaError> {
        world.register_component(ComponentSchema::new(SCENE).field("id", ScalarType::U32))?;
        world.register_component(ComponentSchema::new(NODE).field("scene", ScalarType::U32))?;
        world.register_component(
            ComponentSchema::new(EDGE)
                .field("scene", ScalarType::U32)
                .field("from", ScalarType::EntityRef)
                .field("to", ScalarType::EntityRef),
        )?;
        world.register_component(
            ComponentSchema::new(POSITION)
                .field("x", ScalarType::F32)
                .field("y", ScalarType::F32),
        )?;

        let scene_query = world.register_query(QuerySpec::new().with(SCENE))?;
        let node_query = world.register_query(QuerySpec::new().with(NODE).with(POSITION))?;
        let edge_query = world.register_query(QuerySpec::new().with(EDGE))?;

        Ok(Self {
            scene_id: world.field(SCENE, "id")?,
            node_scene: world.field(NODE, "scene")?,
            edge_scene: world.field(EDGE, "scene")?,
            edge_from: world.field(EDGE, "from")?,
            edge_to: world.field(EDGE, "to")?,
            pos_x: world.field(POSITION, "x")?,
            pos_y: world.field(POSITION, "y")?,
            scene_query,
            node_query,
            edge_query,
            scenes: HashMap::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
        })
    }

    /// One bridge step: mirror marker transitions into the engine, tick the
    /// physics, write positions back.
    pub fn run(
        &mut self,
        world: &mut World,
        engine: &mut LayoutEngine,
        dt: f64,
    ) -> Result<(), WorldError> {
        // Scene lifetimes drive layout lifetimes. Entities destroyed in the
        // same step they entered are skipped; their exit drains next.
        for entity in world.drain_entered(self.scene_query)? {
            if !world.is_alive(entity) {
                continue;
            }
            let id = u64::from(world.get::<u32>(self.scene_id, entity)?);
            self.scenes.insert(entity, id);
            engine.create_scene(id);
        }
        for entity in world.drain_exited(self.scene_query)? {
            if let Some(id) = self.scenes.remove(&entity) {
                engine.remove_scene(id);
            }
        }

        // Node entities join their scene's graph under their entity id.
        for entity in world.drain_entered(self.node_query)? {
            if !world.is_alive(entity) {
                continue;
            }
            let scene = u64::from(world.get::<u32>(self.node_scene, entity)?);
            self.nodes.insert(entity, scene);
            engine.add_node(scene, u64::from(entity.id()));
        }
        for entity in world.drain_exited(self.node_query)? {
            if let Some(scene) = self.nodes.remove(&entity) {
                engine.remove_node(scene, u64::from(entity.id()));
            }
        }

        // Edges connect two node entities within a scene.
        for entity in world.drain_entered(self.edge_query)? {
            if !world.is_alive(entity) {
                continue;
            }
            let scene = u64::from(world.get::<u32>(self.edge_scene, entity)?);
            let from = u64::from(world.get::<u32>(self.edge_from, entity)?);
            let to = u64::from(world.get::<u32>(self.edge_to, entity)?);
            self.edges.insert(entity, (scene, from, to));
            engine.add_edge(scene, from, to);
        }
        for entity in world.drain_exited(self.edge_query)? {
            if let Some((scene, from, to)) = self.edges.remove(&entity) {
                engine.remove_edge(scene, from, to);
            }
        }

        engine.tick_all(dt as f32);

        // Write simulated positions into the output component.
        for entity in world.query(self.node_query)?.to_vec() {
            let Some(&scene) = self.nodes.get(&entity) else {
                continue;
            };
            if let Some(pos) = engine.node_position(scene, u64::from(entity.id())) {
                world.set::<f32>(self.pos_x, entity, pos.x)?;
                world.set::<f32>(self.pos_y, entity, pos.y)?;
            }
        }
        Ok(())
    }
}

/// Wrap a bridge and a shared engine into a pipeline [`System`] named
/// `graph_layout`.
#[must_use]
pub fn layout_system(mut bridge: LayoutBridge, engine: Rc<RefCell<LayoutEngine>>) -> System {
    System::new("graph_layout", move |world, dt| {
        if let Err(err) = bridge.run(world, &mut engine.borrow_mut(), dt) {
            error!(error = %err, "layout bridge step failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutParams;
    use nexus_ecs::ComponentId;

    const DT: f64 = 1.0 / 60.0;

    struct Fixture {
        world: World,
        bridge: LayoutBridge,
        engine: LayoutEngine,
        scene_c: ComponentId,
        node_c: ComponentId,
        edge_c: ComponentId,
        position_c: ComponentId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut world = World::new();
            let bridge = LayoutBridge::register(&mut world).unwrap();
            let engine = LayoutEngine::new(11);
            let scene_c = world.component_id(SCENE).unwrap();
            let node_c = world.component_id(NODE).unwrap();
            let edge_c = world.component_id(EDGE).unwrap();
            let position_c = world.component_id(POSITION).unwrap();
            Self {
                world,
                bridge,
                engine,
                scene_c,
                node_c,
                edge_c,
                position_c,
            }
        }

        fn spawn_scene(&mut self, id: u32) -> Entity {
            let e = self.world.create();
            self.world.add_component(e, self.scene_c).unwrap();
            let field = self.world.field(SCENE, "id").unwrap();
            self.world.set::<u32>(field, e, id).unwrap();
            e
        }

        fn spawn_node(&mut self, scene: u32) -> Entity {
            let e = self.world.create();
            self.world.add_component(e, self.position_c).unwrap();
            self.world.add_component(e, self.node_c).unwrap();
            let field = self.world.field(NODE, "scene").unwrap();
            self.world.set::<u32>(field, e, scene).unwrap();
            e
        }

        fn spawn_edge(&mut self, scene: u32, from: Entity, to: Entity) -> Entity {
            let e = self.world.create();
            self.world.add_component(e, self.edge_c).unwrap();
            self.world
                .set::<u32>(self.world.field(EDGE, "scene").unwrap(), e, scene)
                .unwrap();
            self.world
                .set::<u32>(self.world.field(EDGE, "from").unwrap(), e, from.id())
                .unwrap();
            self.world
                .set::<u32>(self.world.field(EDGE, "to").unwrap(), e, to.id())
                .unwrap();
            e
        }

        fn step(&mut self) {
            self.bridge
                .run(&mut self.world, &mut self.engine, DT)
                .unwrap();
            self.world.commit_removals();
        }
    }

    #[test]
    fn test_scene_and_nodes_flow_into_engine() {
        let mut fx = Fixture::new();
        fx.spawn_scene(1);
        let a = fx.spawn_node(1);
        let b = fx.spawn_node(1);
        fx.spawn_edge(1, a, b);
        fx.step();

        assert!(fx.engine.contains_scene(1));
        let layout = fx.engine.layout(1).unwrap();
        assert_eq!(layout.node_count(), 2);
        assert_eq!(layout.edge_count(), 1);
    }

    #[test]
    fn test_positions_written_back_to_components() {
        let mut fx = Fixture::new();
        fx.spawn_scene(1);
        let a = fx.spawn_node(1);
        let b = fx.spawn_node(1);
        fx.spawn_edge(1, a, b);
        for _ in 0..120 {
            fx.step();
        }

        let x = fx.world.field(POSITION, "x").unwrap();
        let y = fx.world.field(POSITION, "y").unwrap();
        let ax = fx.world.get::<f32>(x, a).unwrap();
        let ay = fx.world.get::<f32>(y, a).unwrap();
        let bx = fx.world.get::<f32>(x, b).unwrap();
        let by = fx.world.get::<f32>(y, b).unwrap();
        let dist = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
        assert!(dist > 0.1, "linked nodes should sit apart, dist = {dist}");
    }

    #[test]
    fn test_node_before_scene_is_ignored() {
        let mut fx = Fixture::new();
        fx.spawn_node(9);
        fx.step();
        assert!(!fx.engine.contains_scene(9));
        assert_eq!(fx.engine.scene_count(), 0);
    }

    #[test]
    fn test_destroying_nodes_tears_scene_down() {
        let mut fx = Fixture::new();
        fx.spawn_scene(1);
        let a = fx.spawn_node(1);
        let b = fx.spawn_node(1);
        fx.step();
        assert!(fx.engine.contains_scene(1));

        fx.world.destroy(a);
        fx.world.destroy(b);
        fx.step();
        assert!(!fx.engine.contains_scene(1));
    }

    #[test]
    fn test_destroying_scene_entity_destroys_layout() {
        let mut fx = Fixture::new();
        let scene = fx.spawn_scene(4);
        fx.spawn_node(4);
        fx.step();
        assert!(fx.engine.contains_scene(4));

        fx.world.destroy(scene);
        fx.step();
        assert!(!fx.engine.contains_scene(4));
    }

    #[test]
    fn test_layout_system_runs_in_pipeline() {
        let mut world = World::new();
        let bridge = LayoutBridge::register(&mut world).unwrap();
        let engine = Rc::new(RefCell::new(LayoutEngine::with_params(
            5,
            LayoutParams::default(),
        )));

        let scene_c = world.component_id(SCENE).unwrap();
        let id_field = world.field(SCENE, "id").unwrap();
        let e = world.create();
        world.add_component(e, scene_c).unwrap();
        world.set::<u32>(id_field, e, 2).unwrap();

        let mut system = layout_system(bridge, Rc::clone(&engine));
        system.run(&mut world, DT);
        assert!(engine.borrow().contains_scene(2));
    }
}
