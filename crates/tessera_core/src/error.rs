//! # Core Error Types
//!
//! Recoverable failures of the storage engine. Programmer errors (reading a
//! dead entity, out-of-range mask bits, requesting a component twice in one
//! query) panic instead; every panicking API documents it.

use thiserror::Error;

use crate::ecs::ComponentId;

/// Errors that can occur in the storage engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A component id was outside the mask capacity.
    #[error("component id {id} out of range: masks hold ids 0..{capacity}")]
    ComponentIdOutOfRange {
        /// The offending id.
        id: usize,
        /// The mask capacity.
        capacity: usize,
    },

    /// Every component id slot is already assigned.
    #[error("component registry full: {capacity} component types already registered")]
    RegistryFull {
        /// The registry capacity.
        capacity: usize,
    },

    /// No layout metadata is registered for a component id.
    #[error("no metadata registered for component {0}")]
    MissingMetadata(ComponentId),

    /// A single-result query matched zero or several entities.
    #[error("expected exactly one matching entity, found {matched}")]
    NotSingle {
        /// Number of entities that matched.
        matched: usize,
    },

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for storage engine operations.
pub type CoreResult<T> = Result<T, CoreError>;
