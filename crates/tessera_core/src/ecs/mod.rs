//! # Entity Component System
//!
//! Hybrid storage: archetype chunks for components most entities carry,
//! sparse sets for the rest, with residency decided per component at
//! runtime.
//!
//! ## Layers
//!
//! - `mask`, `component`, `entity`: ids, bitsets and handles
//! - `storage`, `chunk`, `archetype`, `graph`: dense archetype storage
//! - `sparse`, `archive`: sparse sets and residency migration
//! - `cache`, `query`, `fetch`: cached matching and typed iteration
//! - `world`, `bundle`, `relation`, `stage`: the public surface

mod archetype;
mod archive;
mod bundle;
mod cache;
mod chunk;
mod component;
mod entity;
mod fetch;
mod graph;
mod mask;
mod query;
mod relation;
mod sparse;
mod stage;
mod storage;
mod world;

pub use archetype::{Archetype, ArchetypeId};
pub use archive::{Archive, MaintainReport, Residency};
pub use bundle::Bundle;
pub use cache::{QueryCache, QueryKey};
pub use chunk::Chunk;
pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry, ComponentSet};
pub use entity::{Entity, EntityLocation, EntityRecord, EntityTable};
pub use graph::ArchetypeGraph;
pub use mask::{ComponentMask, MaskIter, MASK_CAPACITY};
pub use query::{Predicate, Query};
pub use relation::{RelationKind, RelationStore};
pub use sparse::SparseSet;
pub use stage::{Stage, StageCallback};
pub use storage::Column;
pub use world::{World, WorldStats};
