//! # Configuration Loading
//!
//! World configuration is read from TOML once at startup and validated
//! before any world is built from it.
//!
//! ```toml
//! chunk_capacity = 256
//!
//! [archive]
//! promote_density = 0.2
//! min_entities_for_analysis = 500
//! ```
//!
//! Omitted keys keep their defaults; unknown keys are rejected.

use std::path::Path;

use tessera_core::{World, WorldConfig};

use crate::error::{TesseraError, TesseraResult};

/// Parses and validates a configuration document.
///
/// # Errors
///
/// Returns [`TesseraError::ConfigParse`] for malformed TOML or unknown
/// keys, and [`TesseraError::Core`] if a value is out of range.
pub fn load_str(source: &str) -> TesseraResult<WorldConfig> {
    let config: WorldConfig = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a configuration file.
///
/// # Errors
///
/// As [`load_str`], plus [`TesseraError::ConfigRead`] if the file cannot
/// be read.
pub fn load_file(path: impl AsRef<Path>) -> TesseraResult<WorldConfig> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|source| TesseraError::ConfigRead { path: path.to_path_buf(), source })?;
    let config = load_str(&source)?;
    tracing::info!(path = %path.display(), "loaded world configuration");
    Ok(config)
}

/// Builds a world from a configuration file.
///
/// # Errors
///
/// See [`load_file`].
pub fn world_from_file(path: impl AsRef<Path>) -> TesseraResult<World> {
    Ok(World::with_config(load_file(path)?)?)
}
