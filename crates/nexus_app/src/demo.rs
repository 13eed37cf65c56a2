//! Demo world: a small network of devices laid out by the graph engine.
//!
//! Builds a hub-and-spoke topology — one gateway device every other device
//! links to, plus a few extra seeded cross-links — and composes the
//! pipeline that lays it out.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use nexus_ecs::{
    ComponentSchema, Entity, FieldRef, Pipeline, QuerySpec, ScalarType, System, World,
};
use nexus_layout::sync::{EDGE, NODE, POSITION, SCENE};
use nexus_layout::{layout_system, LayoutBridge, LayoutEngine};

/// The single demo scene's group id.
pub const SCENE_ID: u32 = 1;

/// A built demo world plus the handles needed to drive and inspect it.
pub struct Demo {
    pub world: World,
    pub pipeline: Pipeline,
    pub engine: Rc<RefCell<LayoutEngine>>,
    pub devices: Vec<Entity>,
    pub pos_x: FieldRef,
    pub pos_y: FieldRef,
}

/// Build a world with `device_count` devices in one layout scene.
pub fn build(device_count: usize, seed: u64) -> Result<Demo> {
    anyhow::ensure!(device_count >= 2, "the network needs at least two devices");

    let mut world = World::new();
    let bridge = LayoutBridge::register(&mut world)?;

    let device = world.register_component(
        ComponentSchema::new("device")
            .field("kind", ScalarType::U8)
            .field("gateway", ScalarType::EntityRef),
    )?;
    let moved = world.register_query(QuerySpec::new().with("device").watch(POSITION))?;

    let scene_c = world.component_id(SCENE).expect("bridge registers scene");
    let node_c = world.component_id(NODE).expect("bridge registers node");
    let edge_c = world.component_id(EDGE).expect("bridge registers edge");
    let position_c = world
        .component_id(POSITION)
        .expect("bridge registers position");

    let scene_id = world.field(SCENE, "id")?;
    let node_scene = world.field(NODE, "scene")?;
    let edge_scene = world.field(EDGE, "scene")?;
    let edge_from = world.field(EDGE, "from")?;
    let edge_to = world.field(EDGE, "to")?;
    let device_kind = world.field("device", "kind")?;
    let device_gateway = world.field("device", "gateway")?;
    let pos_x = world.field(POSITION, "x")?;
    let pos_y = world.field(POSITION, "y")?;

    // The scene marker entity.
    let scene = world.create();
    world.add_component(scene, scene_c)?;
    world.set::<u32>(scene_id, scene, SCENE_ID)?;

    // Devices: entity 0 of the batch is the gateway hub.
    let mut rng = StdRng::seed_from_u64(seed);
    let mut devices = Vec::with_capacity(device_count);
    for i in 0..device_count {
        let e = world.create();
        world.add_component(e, position_c)?;
        world.add_component(e, node_c)?;
        world.set::<u32>(node_scene, e, SCENE_ID)?;
        world.add_component(e, device)?;
        world.set::<u8>(device_kind, e, if i == 0 { 0 } else { rng.gen_range(1..4) })?;
        devices.push(e);
    }
    let hub = devices[0];
    for &e in &devices {
        world.set::<u32>(device_gateway, e, hub.id())?;
    }

    // Spokes to the hub, plus a few seeded cross-links.
    let add_link = |world: &mut World, from: Entity, to: Entity| -> Result<()> {
        let e = world.create();
        world.add_component(e, edge_c)?;
        world.set::<u32>(edge_scene, e, SCENE_ID)?;
        world.set::<u32>(edge_from, e, from.id())?;
        world.set::<u32>(edge_to, e, to.id())?;
        Ok(())
    };
    for &e in &devices[1..] {
        add_link(&mut world, hub, e)?;
    }
    for i in 2..device_count {
        if rng.gen_bool(0.3) {
            let peer = devices[rng.gen_range(1..i)];
            add_link(&mut world, devices[i], peer)?;
        }
    }

    let engine = Rc::new(RefCell::new(LayoutEngine::new(seed)));
    let pipeline = Pipeline::new()
        .with(layout_system(bridge, Rc::clone(&engine)))
        .with(System::new("motion_report", move |world: &mut World, _dt| {
            match world.query_changed(moved, true) {
                Ok(changed) if !changed.is_empty() => {
                    debug!(moved = changed.len(), "device positions updated");
                }
                _ => {}
            }
        }));

    Ok(Demo {
        world,
        pipeline,
        engine,
        devices,
        pos_x,
        pos_y,
    })
}
