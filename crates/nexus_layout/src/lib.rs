//! # nexus_layout
//!
//! Force-directed graph layout: one independent spring/repulsion simulation
//! per scene, with deterministic seeded placement, energy-based settling,
//! and a reveal curve that eases new graphs into view.
//!
//! This crate provides:
//!
//! - [`ForceGraph`] — points, springs, and the pairwise force model.
//! - [`Layout`] / [`LayoutEngine`] — per-scene simulations keyed by a
//!   caller-supplied scene id; operations on missing scenes are safe no-ops.
//! - [`LayoutBridge`] / [`layout_system`] — the ECS bridge that drives the
//!   engine from `graph_scene` / `graph_node` / `graph_edge` marker
//!   components and writes results into `position` components.

pub mod layout;
pub mod physics;
pub mod sync;

pub use layout::{Layout, LayoutEngine, LayoutError, LayoutParams};
pub use physics::{ForceGraph, PhysicsParams};
pub use sync::{layout_system, LayoutBridge};
