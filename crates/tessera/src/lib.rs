//! # TESSERA
//!
//! Hybrid archetype / sparse-set entity-component engine.
//!
//! This crate re-exports the storage engine from `tessera_core` and adds
//! what sits around it at startup:
//! - [`config`]: TOML world configuration, loaded once and validated
//! - [`Schedule`]: named systems ordered per stage by `after` / `before`
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera::prelude::*;
//!
//! let mut world = World::with_config(tessera::config::load_file("world.toml")?)?;
//! let mut schedule = Schedule::new();
//! schedule.add_system(SystemDescriptor::new("movement"), |world: &mut World| {
//!     world.query().for_each2::<Position, Velocity>(|pos, vel| pos.x += vel.x);
//! });
//! schedule.build(&mut world)?;
//! schedule.run(&mut world);
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
pub mod error;
pub mod schedule;

pub use error::{ScheduleError, TesseraError, TesseraResult};
pub use schedule::{Schedule, SystemDescriptor};
pub use tessera_core::*;

/// Common imports.
pub mod prelude {
    pub use crate::error::{ScheduleError, TesseraError, TesseraResult};
    pub use crate::schedule::{Schedule, SystemDescriptor};
    pub use tessera_core::{
        Bundle, Component, ComponentMask, CoreError, CoreResult, Entity, MaintainReport, Query,
        RelationKind, Residency, Stage, World, WorldConfig, WorldStats,
    };
}
