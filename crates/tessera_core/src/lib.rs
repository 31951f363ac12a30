//! # TESSERA Core Engine
//!
//! Hybrid archetype / sparse-set Entity Component System storage:
//! - Components most entities carry live in chunked archetype columns
//! - Rare components live in per-component sparse sets
//! - Residency migrates automatically as component density changes
//!
//! ## Architecture Rules
//!
//! 1. **Components are plain data** - every component is `Pod` and moves as raw bytes
//! 2. **Structure needs `&mut World`** - queries borrow the world, so the borrow checker enforces single-writer access
//! 3. **Matching is cached** - archetype lists are memoized per mask triple and revalidated by a structural version
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::World;
//!
//! let mut world = World::new();
//! let entity = world.spawn((Position::default(), Velocity { x: 1.0, y: 0.0 }));
//! world.query().for_each2::<Position, Velocity>(|pos, vel| pos.x += vel.x);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
// Arity macros and index math; mirrors the workspace lint table
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::{ArchiveConfig, WorldConfig};
pub use ecs::{
    Archetype, ArchetypeGraph, ArchetypeId, Archive, Bundle, Chunk, Column, Component,
    ComponentId, ComponentInfo, ComponentMask, ComponentRegistry, ComponentSet, Entity,
    EntityLocation, MaintainReport, Query, RelationKind, RelationStore, Residency, SparseSet,
    Stage, World, WorldStats, MASK_CAPACITY,
};
pub use error::{CoreError, CoreResult};
pub use memory::{Pool, PoolStats};
