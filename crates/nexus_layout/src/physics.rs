//! Spring/repulsion force simulation.
//!
//! A [`ForceGraph`] holds mass points and springs keyed by caller-supplied
//! node ids. Each tick applies pairwise inverse-square repulsion, Hooke
//! spring forces toward rest length, and global velocity damping, then
//! integrates semi-implicitly and reports the total kinetic energy left in
//! the system. The caller decides when that energy is low enough to stop
//! ticking.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

/// Tuning constants for the force model.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsParams {
    /// Repulsion strength between every pair of points.
    pub repulsion: f32,
    /// Spring stiffness.
    pub stiffness: f32,
    /// Velocity retained per tick (0..1).
    pub damping: f32,
    /// Distance floor for the repulsion denominator, keeps coincident
    /// points from exploding.
    pub min_distance: f32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            repulsion: 400.0,
            stiffness: 80.0,
            damping: 0.5,
            min_distance: 0.1,
        }
    }
}

/// One simulated mass point.
#[derive(Debug, Clone)]
struct Point {
    id: u64,
    pos: Vec2,
    vel: Vec2,
    mass: f32,
}

/// A spring between two node ids. Springs whose endpoints are missing are
/// skipped at tick time.
#[derive(Debug, Clone)]
struct Spring {
    from: u64,
    to: u64,
    length: f32,
}

/// The physics graph: points, springs, and the pairwise force model.
#[derive(Debug, Default)]
pub struct ForceGraph {
    points: Vec<Point>,
    index: HashMap<u64, usize>,
    springs: Vec<Spring>,
    edge_keys: HashSet<(u64, u64)>,
}

impl ForceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.points.len()
    }

    /// Number of springs.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.springs.len()
    }

    /// Whether a point with this id exists.
    #[must_use]
    pub fn has_node(&self, id: u64) -> bool {
        self.index.contains_key(&id)
    }

    /// Insert a point at the given position. A duplicate id is a no-op.
    /// Returns whether the point was inserted.
    pub fn add_node(&mut self, id: u64, pos: Vec2, mass: f32) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.points.len());
        self.points.push(Point {
            id,
            pos,
            vel: Vec2::ZERO,
            mass,
        });
        true
    }

    /// Remove a point and every spring connected to it. Returns whether the
    /// point existed.
    pub fn remove_node(&mut self, id: u64) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        self.points.swap_remove(slot);
        if let Some(moved) = self.points.get(slot) {
            self.index.insert(moved.id, slot);
        }
        self.springs.retain(|s| s.from != id && s.to != id);
        self.edge_keys.retain(|&(a, b)| a != id && b != id);
        true
    }

    /// Insert a spring between two node ids. The `(from, to)` pair is the
    /// spring's identity: inserting the same pair twice is a no-op. Returns
    /// whether the spring was inserted.
    pub fn add_spring(&mut self, from: u64, to: u64, length: f32) -> bool {
        if !self.edge_keys.insert((from, to)) {
            return false;
        }
        self.springs.push(Spring { from, to, length });
        true
    }

    /// Remove the spring identified by `(from, to)`. Returns whether it
    /// existed.
    pub fn remove_spring(&mut self, from: u64, to: u64) -> bool {
        if !self.edge_keys.remove(&(from, to)) {
            return false;
        }
        self.springs.retain(|s| !(s.from == from && s.to == to));
        true
    }

    /// A point's current simulated position.
    #[must_use]
    pub fn position(&self, id: u64) -> Option<Vec2> {
        self.index.get(&id).map(|&slot| self.points[slot].pos)
    }

    /// Iterate over `(id, position)` for every point.
    pub fn positions(&self) -> impl Iterator<Item = (u64, Vec2)> + '_ {
        self.points.iter().map(|p| (p.id, p.pos))
    }

    /// Centre of the graph's bounding box, `Vec2::ZERO` when empty.
    #[must_use]
    pub fn bounds_center(&self) -> Vec2 {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return Vec2::ZERO;
        };
        let (mut min, mut max) = (first.pos, first.pos);
        for p in points {
            min = min.min(p.pos);
            max = max.max(p.pos);
        }
        (min + max) * 0.5
    }

    /// Advance the simulation by `dt` seconds. Returns the total kinetic
    /// energy after the step.
    pub fn tick(&mut self, params: &PhysicsParams, dt: f32) -> f32 {
        let n = self.points.len();
        let mut forces = vec![Vec2::ZERO; n];

        // Pairwise repulsion, inverse-square with a clamped denominator.
        for i in 0..n {
            for j in (i + 1)..n {
                let delta = self.points[j].pos - self.points[i].pos;
                let dist_sq = delta
                    .length_squared()
                    .max(params.min_distance * params.min_distance);
                let dir = if delta.length_squared() > f32::EPSILON {
                    delta / dist_sq.sqrt()
                } else {
                    // Coincident points push apart along a fixed axis.
                    Vec2::X
                };
                let push = dir * (params.repulsion / dist_sq);
                forces[i] -= push;
                forces[j] += push;
            }
        }

        // Hooke springs, each endpoint pulled half the displacement.
        for spring in &self.springs {
            let (Some(&a), Some(&b)) = (self.index.get(&spring.from), self.index.get(&spring.to))
            else {
                continue;
            };
            let delta = self.points[b].pos - self.points[a].pos;
            let dist = delta.length().max(f32::EPSILON);
            let dir = delta / dist;
            let pull = dir * (params.stiffness * (dist - spring.length) * 0.5);
            forces[a] += pull;
            forces[b] -= pull;
        }

        // Damped semi-implicit Euler; accumulate kinetic energy.
        let mut energy = 0.0;
        for (point, force) in self.points.iter_mut().zip(&forces) {
            point.vel = (point.vel + *force / point.mass * dt) * params.damping;
            point.pos += point.vel * dt;
            energy += 0.5 * point.mass * point.vel.length_squared();
        }
        energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_node_is_noop() {
        let mut graph = ForceGraph::new();
        assert!(graph.add_node(1, Vec2::ZERO, 1.0));
        assert!(!graph.add_node(1, Vec2::ONE, 1.0));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.position(1), Some(Vec2::ZERO));
    }

    #[test]
    fn test_duplicate_spring_is_noop() {
        let mut graph = ForceGraph::new();
        graph.add_node(1, Vec2::ZERO, 1.0);
        graph.add_node(2, Vec2::X, 1.0);
        assert!(graph.add_spring(1, 2, 1.0));
        assert!(!graph.add_spring(1, 2, 1.0));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_remove_node_drops_connected_springs() {
        let mut graph = ForceGraph::new();
        graph.add_node(1, Vec2::ZERO, 1.0);
        graph.add_node(2, Vec2::X, 1.0);
        graph.add_node(3, Vec2::Y, 1.0);
        graph.add_spring(1, 2, 1.0);
        graph.add_spring(2, 3, 1.0);
        assert!(graph.remove_node(2));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        // The removed pair can be re-added.
        graph.add_node(2, Vec2::ONE, 1.0);
        assert!(graph.add_spring(1, 2, 1.0));
    }

    #[test]
    fn test_repulsion_pushes_points_apart() {
        let mut graph = ForceGraph::new();
        graph.add_node(1, Vec2::new(-0.5, 0.0), 1.0);
        graph.add_node(2, Vec2::new(0.5, 0.0), 1.0);
        let params = PhysicsParams::default();
        graph.tick(&params, 0.016);
        let a = graph.position(1).unwrap();
        let b = graph.position(2).unwrap();
        assert!(a.x < -0.5 && b.x > 0.5, "points should repel: {a} {b}");
    }

    #[test]
    fn test_spring_pulls_stretched_pair_together() {
        let mut graph = ForceGraph::new();
        graph.add_node(1, Vec2::new(-10.0, 0.0), 1.0);
        graph.add_node(2, Vec2::new(10.0, 0.0), 1.0);
        graph.add_spring(1, 2, 1.0);
        let params = PhysicsParams::default();
        graph.tick(&params, 0.016);
        let a = graph.position(1).unwrap();
        let b = graph.position(2).unwrap();
        assert!((b.x - a.x) < 20.0, "spring should contract: {a} {b}");
    }

    #[test]
    fn test_damping_bleeds_energy_to_rest() {
        let mut graph = ForceGraph::new();
        graph.add_node(1, Vec2::new(-1.0, 0.3), 1.0);
        graph.add_node(2, Vec2::new(1.0, -0.3), 1.0);
        graph.add_spring(1, 2, 1.5);
        let params = PhysicsParams::default();
        let mut energy = f32::MAX;
        for _ in 0..600 {
            energy = graph.tick(&params, 0.016);
        }
        assert!(energy < 0.01, "system should settle, energy = {energy}");
    }

    #[test]
    fn test_bounds_center() {
        let mut graph = ForceGraph::new();
        assert_eq!(graph.bounds_center(), Vec2::ZERO);
        graph.add_node(1, Vec2::new(-2.0, 0.0), 1.0);
        graph.add_node(2, Vec2::new(4.0, 2.0), 1.0);
        assert_eq!(graph.bounds_center(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_spring_with_missing_endpoint_is_skipped() {
        let mut graph = ForceGraph::new();
        graph.add_node(1, Vec2::ZERO, 1.0);
        graph.add_spring(1, 99, 1.0);
        let params = PhysicsParams::default();
        // Must not panic; the dangling spring contributes nothing.
        graph.tick(&params, 0.016);
    }
}
