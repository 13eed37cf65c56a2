//! # nexus_ecs
//!
//! A data-oriented entity-component substrate: schema-described columnar
//! component storage, bitmask-based query matching with incrementally
//! maintained matched sets and enter/exit transition logs, shadow-buffer
//! change detection, and a sequential system pipeline with deferred
//! query-removal commits.
//!
//! This crate provides:
//!
//! - [`ComponentSchema`] — static tagged descriptors for component types
//!   (scalar fields, fixed-length arrays, or zero-size tags).
//! - [`Entity`] / [`EntityAllocator`] — `u32` entity ids with freelist
//!   recycling, one id space per world.
//! - [`ColumnStore`] — per-component columnar storage with same-type fields
//!   packed into shared typed lanes.
//! - [`World`] — the aggregate everything operates on.
//! - [`QuerySpec`] / [`QueryId`] — required/excluded/watched component
//!   predicates with entered/exited logs and changed-value scans.
//! - [`System`] / [`Pipeline`] — sequential per-tick execution with
//!   once-per-world setup and end-of-step removal commits.
//!
//! Everything is single-threaded and frame-driven: one tick runs the
//! pipeline to completion, and query membership only mutates between steps.

mod change;

pub mod entity;
pub mod query;
pub mod schema;
pub mod store;
pub mod system;
pub mod world;

pub use entity::{Entity, EntityAllocator};
pub use query::{QueryId, QuerySpec};
pub use schema::{ComponentSchema, FieldDef, FieldKind, ScalarType, SchemaError};
pub use store::{ColumnStore, FieldSlot, LaneScalar};
pub use system::{Pipeline, System};
pub use world::{ComponentId, FieldRef, World, WorldError};
