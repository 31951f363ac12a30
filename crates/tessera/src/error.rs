//! # Facade Error Types
//!
//! Everything that can fail while setting a world up: configuration files,
//! system ordering, and the engine itself.

use std::path::PathBuf;

use thiserror::Error;

use tessera_core::{CoreError, Stage};

/// Errors raised while building a [`Schedule`](crate::Schedule).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The ordering constraints of a stage form a cycle.
    #[error("ordering cycle in stage {stage:?} through systems {systems:?}")]
    Cycle {
        /// Stage holding the cycle.
        stage: Stage,
        /// Systems that could not be ordered.
        systems: Vec<String>,
    },

    /// An ordering constraint names a system that does not exist in the
    /// same stage.
    #[error("system {system} is ordered against unknown system {dependency}")]
    UnknownDependency {
        /// System declaring the constraint.
        system: String,
        /// The missing name.
        dependency: String,
    },

    /// Two systems share a name.
    #[error("system {0} is registered twice")]
    DuplicateSystem(String),
}

/// Any error surfaced by the facade.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// The storage engine rejected an operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// System ordering could not be resolved.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A configuration document did not parse.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    ConfigRead {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

/// Result type for facade operations.
pub type TesseraResult<T> = Result<T, TesseraError>;
