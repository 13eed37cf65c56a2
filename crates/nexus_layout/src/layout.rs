//! Per-scene layouts and the engine that owns them.
//!
//! A [`Layout`] is one independent force-directed simulation: a physics
//! graph, a seeded RNG for initial placement, an energy threshold that
//! decides when to stop ticking, and a reveal progress that eases the
//! rendered scale from near zero up to full size. The [`LayoutEngine`] keys
//! layouts by a caller-supplied scene id; operations referencing a missing
//! scene are safe no-ops.

use std::collections::HashMap;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, trace};

use crate::physics::{ForceGraph, PhysicsParams};

/// Layout errors. Missing scenes are not errors (they are ignored); only
/// runaway iteration surfaces here.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout did not settle within {iterations} iterations")]
    TooManyIterations { iterations: u32 },
}

/// Tuning for a layout: the physics constants plus the layout-level knobs.
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    pub physics: PhysicsParams,
    /// Rest length for springs created by edge insertion.
    pub rest_length: f32,
    /// Ticking stops once total kinetic energy drops below this.
    pub min_energy: f32,
    /// Reveal progress gained per second.
    pub reveal_rate: f32,
    /// Radius of the disc new nodes are placed in.
    pub placement_radius: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            physics: PhysicsParams::default(),
            rest_length: 2.0,
            min_energy: 0.01,
            reveal_rate: 1.5,
            placement_radius: 2.0,
        }
    }
}

/// Scale floor so a freshly created layout is drawn near-zero rather than
/// invisible.
const MIN_REVEAL_SCALE: f32 = 0.01;

fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}

/// One scene's force-directed simulation.
#[derive(Debug)]
pub struct Layout {
    graph: ForceGraph,
    rng: StdRng,
    params: LayoutParams,
    reveal: f32,
    active: bool,
    energy: f32,
}

impl Layout {
    /// A layout driven by an explicitly injected PRNG. The engine derives
    /// one per scene; tests may hand in any seeded instance.
    #[must_use]
    pub fn new(rng: StdRng, params: LayoutParams) -> Self {
        Self {
            graph: ForceGraph::new(),
            rng,
            params,
            reveal: 0.0,
            active: false,
            energy: 0.0,
        }
    }

    /// Insert a node, placed deterministically from the layout's seeded
    /// RNG. A duplicate id is a no-op. Any insertion wakes the simulation.
    pub fn add_node(&mut self, node: u64) {
        if self.graph.has_node(node) {
            return;
        }
        let angle = self.rng.gen::<f32>() * std::f32::consts::TAU;
        let radius = self.rng.gen::<f32>().sqrt() * self.params.placement_radius;
        let pos = Vec2::new(angle.cos(), angle.sin()) * radius;
        self.graph.add_node(node, pos, 1.0);
        self.active = true;
    }

    /// Remove a node and its springs. Returns whether the node existed.
    pub fn remove_node(&mut self, node: u64) -> bool {
        let removed = self.graph.remove_node(node);
        if removed {
            self.active = true;
        }
        removed
    }

    /// Insert an edge. The `(from, to)` pair is the edge's identity;
    /// duplicates are no-ops.
    pub fn add_edge(&mut self, from: u64, to: u64) {
        if self.graph.add_spring(from, to, self.params.rest_length) {
            self.active = true;
        }
    }

    /// Remove the edge identified by `(from, to)`.
    pub fn remove_edge(&mut self, from: u64, to: u64) {
        if self.graph.remove_spring(from, to) {
            self.active = true;
        }
    }

    /// Advance reveal progress and, while unsettled, the physics. Ticking
    /// pauses once energy falls below the threshold and resumes on the next
    /// membership change.
    pub fn tick(&mut self, dt: f32) {
        self.reveal = (self.reveal + self.params.reveal_rate * dt).min(1.0);
        if !self.active {
            return;
        }
        self.energy = self.graph.tick(&self.params.physics, dt);
        if self.energy < self.params.min_energy {
            self.active = false;
            trace!(energy = self.energy, "layout settled");
        }
    }

    /// Tick until settled, failing fast if the bound is exceeded.
    pub fn run_to_rest(&mut self, dt: f32, max_ticks: u32) -> Result<u32, LayoutError> {
        let mut ticks = 0;
        while self.active {
            if ticks >= max_ticks {
                return Err(LayoutError::TooManyIterations { iterations: ticks });
            }
            self.tick(dt);
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Whether the simulation is paused below the energy threshold.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.active
    }

    /// Total kinetic energy after the last tick.
    #[must_use]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn reveal_scale(&self) -> f32 {
        ease_out_cubic(self.reveal).max(MIN_REVEAL_SCALE)
    }

    /// A node's output position: the simulated point, re-centred on the
    /// graph's bounding box and scaled by the eased reveal progress.
    #[must_use]
    pub fn node_position(&self, node: u64) -> Option<Vec2> {
        let center = self.graph.bounds_center();
        self.graph
            .position(node)
            .map(|pos| (pos - center) * self.reveal_scale())
    }

    /// Both endpoints of an edge, derived from the connected nodes'
    /// simulated positions.
    #[must_use]
    pub fn edge_endpoints(&self, from: u64, to: u64) -> Option<(Vec2, Vec2)> {
        Some((self.node_position(from)?, self.node_position(to)?))
    }

    /// The raw simulated position, before recentring and reveal scaling.
    #[must_use]
    pub fn raw_position(&self, node: u64) -> Option<Vec2> {
        self.graph.position(node)
    }
}

/// Owns one [`Layout`] per scene id.
///
/// Per-layout RNG seeds are derived from the engine seed and the scene id,
/// so a given topology reproduces the same placement on every run.
#[derive(Debug)]
pub struct LayoutEngine {
    layouts: HashMap<u64, Layout>,
    params: LayoutParams,
    seed: u64,
}

impl LayoutEngine {
    /// An engine with default parameters.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_params(seed, LayoutParams::default())
    }

    #[must_use]
    pub fn with_params(seed: u64, params: LayoutParams) -> Self {
        Self {
            layouts: HashMap::new(),
            params,
            seed,
        }
    }

    /// Number of live scenes.
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.layouts.len()
    }

    /// Whether a scene exists.
    #[must_use]
    pub fn contains_scene(&self, scene: u64) -> bool {
        self.layouts.contains_key(&scene)
    }

    /// Access a scene's layout.
    #[must_use]
    pub fn layout(&self, scene: u64) -> Option<&Layout> {
        self.layouts.get(&scene)
    }

    /// Create a scene with an RNG keyed by the engine seed and scene id.
    /// An existing scene is left untouched.
    pub fn create_scene(&mut self, scene: u64) {
        self.layouts.entry(scene).or_insert_with(|| {
            debug!(scene, "creating layout");
            let seed = self.seed ^ scene.wrapping_mul(0x9E37_79B9_7F4A_7C15);
            Layout::new(StdRng::seed_from_u64(seed), self.params)
        });
    }

    /// Destroy a scene and its simulation.
    pub fn remove_scene(&mut self, scene: u64) {
        if self.layouts.remove(&scene).is_some() {
            debug!(scene, "destroyed layout");
        }
    }

    /// Add a node to a scene. Missing scenes are ignored.
    pub fn add_node(&mut self, scene: u64, node: u64) {
        match self.layouts.get_mut(&scene) {
            Some(layout) => layout.add_node(node),
            None => trace!(scene, node, "node for unknown scene ignored"),
        }
    }

    /// Remove a node from a scene. A scene whose node set becomes empty is
    /// torn down and its id evicted from the lookup table.
    pub fn remove_node(&mut self, scene: u64, node: u64) {
        let Some(layout) = self.layouts.get_mut(&scene) else {
            trace!(scene, node, "node removal for unknown scene ignored");
            return;
        };
        if layout.remove_node(node) && layout.is_empty() {
            self.layouts.remove(&scene);
            debug!(scene, "layout emptied, tearing down");
        }
    }

    /// Add an edge to a scene. Missing scenes are ignored.
    pub fn add_edge(&mut self, scene: u64, from: u64, to: u64) {
        match self.layouts.get_mut(&scene) {
            Some(layout) => layout.add_edge(from, to),
            None => trace!(scene, from, to, "edge for unknown scene ignored"),
        }
    }

    /// Remove an edge from a scene. Missing scenes are ignored.
    pub fn remove_edge(&mut self, scene: u64, from: u64, to: u64) {
        if let Some(layout) = self.layouts.get_mut(&scene) {
            layout.remove_edge(from, to);
        }
    }

    /// Tick every scene.
    pub fn tick_all(&mut self, dt: f32) {
        for layout in self.layouts.values_mut() {
            layout.tick(dt);
        }
    }

    /// Tick one scene until it settles. A missing scene settles trivially.
    pub fn run_to_rest(
        &mut self,
        scene: u64,
        dt: f32,
        max_ticks: u32,
    ) -> Result<u32, LayoutError> {
        match self.layouts.get_mut(&scene) {
            Some(layout) => layout.run_to_rest(dt, max_ticks),
            None => Ok(0),
        }
    }

    /// A node's output position within a scene.
    #[must_use]
    pub fn node_position(&self, scene: u64, node: u64) -> Option<Vec2> {
        self.layouts.get(&scene)?.node_position(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_missing_scene_operations_are_noops() {
        let mut engine = LayoutEngine::new(7);
        engine.add_node(1, 10);
        engine.add_edge(1, 10, 11);
        engine.remove_node(1, 10);
        engine.remove_edge(1, 10, 11);
        assert_eq!(engine.scene_count(), 0);
    }

    #[test]
    fn test_duplicate_edge_does_not_grow_edge_count() {
        let mut engine = LayoutEngine::new(7);
        engine.create_scene(1);
        engine.add_node(1, 10);
        engine.add_node(1, 11);
        engine.add_edge(1, 10, 11);
        engine.add_edge(1, 10, 11);
        assert_eq!(engine.layout(1).unwrap().edge_count(), 1);
    }

    #[test]
    fn test_emptied_layout_is_torn_down() {
        let mut engine = LayoutEngine::new(7);
        engine.create_scene(1);
        engine.add_node(1, 10);
        engine.add_node(1, 11);
        engine.remove_node(1, 10);
        assert!(engine.contains_scene(1));
        engine.remove_node(1, 11);
        assert!(!engine.contains_scene(1));
        assert!(engine.node_position(1, 11).is_none());
    }

    #[test]
    fn test_same_seed_same_insertions_identical_placement() {
        let mut a = LayoutEngine::new(42);
        let mut b = LayoutEngine::new(42);
        for engine in [&mut a, &mut b] {
            engine.create_scene(3);
            engine.add_node(3, 1);
            engine.add_node(3, 2);
            engine.add_node(3, 3);
        }
        for node in [1, 2, 3] {
            assert_eq!(
                a.layout(3).unwrap().raw_position(node),
                b.layout(3).unwrap().raw_position(node),
                "placement must be bit-identical for node {node}"
            );
        }
    }

    #[test]
    fn test_different_scenes_place_differently() {
        let mut engine = LayoutEngine::new(42);
        engine.create_scene(1);
        engine.create_scene(2);
        engine.add_node(1, 10);
        engine.add_node(2, 10);
        assert_ne!(
            engine.layout(1).unwrap().raw_position(10),
            engine.layout(2).unwrap().raw_position(10)
        );
    }

    #[test]
    fn test_two_node_one_edge_settles_apart() {
        let mut engine = LayoutEngine::new(9);
        engine.create_scene(1);
        engine.add_node(1, 1);
        engine.add_node(1, 2);
        engine.add_edge(1, 1, 2);

        let ticks = engine.run_to_rest(1, DT, 5_000).unwrap();
        assert!(ticks > 0);
        let layout = engine.layout(1).unwrap();
        assert!(layout.is_settled());

        let a = layout.node_position(1).unwrap();
        let b = layout.node_position(2).unwrap();
        assert!(a.distance(b) > 0.1, "settled nodes must not coincide");

        let (from, to) = layout.edge_endpoints(1, 2).unwrap();
        assert!(from.distance(a) < 1e-5);
        assert!(to.distance(b) < 1e-5);
    }

    #[test]
    fn test_run_to_rest_reports_runaway_iteration() {
        let params = LayoutParams {
            // Threshold nothing reaches, so the layout never settles.
            min_energy: 0.0,
            ..LayoutParams::default()
        };
        let mut engine = LayoutEngine::with_params(9, params);
        engine.create_scene(1);
        engine.add_node(1, 1);
        engine.add_node(1, 2);
        let err = engine.run_to_rest(1, DT, 50).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::TooManyIterations { iterations: 50 }
        ));
    }

    #[test]
    fn test_membership_change_wakes_settled_layout() {
        let mut engine = LayoutEngine::new(9);
        engine.create_scene(1);
        engine.add_node(1, 1);
        engine.add_node(1, 2);
        engine.add_edge(1, 1, 2);
        engine.run_to_rest(1, DT, 5_000).unwrap();
        assert!(engine.layout(1).unwrap().is_settled());

        engine.add_node(1, 3);
        assert!(!engine.layout(1).unwrap().is_settled());
    }

    #[test]
    fn test_reveal_scale_eases_to_full_size() {
        // Zeroed forces freeze the raw positions so only reveal moves the
        // output.
        let params = LayoutParams {
            physics: PhysicsParams {
                repulsion: 0.0,
                stiffness: 0.0,
                ..PhysicsParams::default()
            },
            ..LayoutParams::default()
        };
        let mut engine = LayoutEngine::with_params(9, params);
        engine.create_scene(1);
        engine.add_node(1, 1);
        engine.add_node(1, 2);

        let layout = engine.layout(1).unwrap();
        let raw_span = layout
            .raw_position(1)
            .unwrap()
            .distance(layout.raw_position(2).unwrap());
        let early_span = layout
            .node_position(1)
            .unwrap()
            .distance(layout.node_position(2).unwrap());
        assert!(
            early_span < raw_span * 0.05,
            "fresh layout starts near zero scale"
        );

        // Three seconds saturates the reveal at full scale.
        for _ in 0..180 {
            engine.tick_all(DT);
        }
        let layout = engine.layout(1).unwrap();
        let late_span = layout
            .node_position(1)
            .unwrap()
            .distance(layout.node_position(2).unwrap());
        assert!((late_span - raw_span).abs() < 1e-4);
    }
}
