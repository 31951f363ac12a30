//! # Memory Management
//!
//! Reuse of storage blocks across structural changes.
//!
//! Archetype chunks are pooled rather than freed when they empty, so an
//! archetype that oscillates around a chunk boundary does not reallocate
//! its columns every frame.

mod pool;

pub use pool::{Pool, PoolStats};
