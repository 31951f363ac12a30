//! # World Configuration
//!
//! Tunables for chunk sizing and density-driven residency migration.
//! Every field has a default, so a configuration file only needs to name
//! what it changes.

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Thresholds steering migration between archetype and sparse-set storage.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Density above which a sparse component moves into archetypes.
    pub promote_density: f64,
    /// Density below which an archetype component moves to a sparse set.
    pub demote_density: f64,
    /// Live entity count below which densities are not analysed at all.
    pub min_entities_for_analysis: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            promote_density: 0.15,
            // Gap to promote_density is the hysteresis band
            demote_density: 0.05,
            min_entities_for_analysis: 1000,
        }
    }
}

impl ArchiveConfig {
    /// Checks `0 <= demote_density < promote_density <= 1`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the violated bound.
    pub fn validate(&self) -> CoreResult<()> {
        let Self { promote_density, demote_density, .. } = *self;
        if !(0.0..=1.0).contains(&promote_density) {
            return Err(CoreError::InvalidConfig(format!(
                "promote_density {promote_density} is outside [0, 1]"
            )));
        }
        if !(0.0..=1.0).contains(&demote_density) {
            return Err(CoreError::InvalidConfig(format!(
                "demote_density {demote_density} is outside [0, 1]"
            )));
        }
        if demote_density >= promote_density {
            return Err(CoreError::InvalidConfig(format!(
                "demote_density {demote_density} must be below promote_density {promote_density}"
            )));
        }
        Ok(())
    }
}

/// Configuration of one world.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Residency migration thresholds.
    pub archive: ArchiveConfig,
    /// Rows per archetype chunk.
    pub chunk_capacity: usize,
    /// Empty chunks each archetype keeps for reuse.
    pub chunk_pool_limit: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveConfig::default(),
            chunk_capacity: 512,
            chunk_pool_limit: 4,
        }
    }
}

impl WorldConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero chunk capacity or
    /// inconsistent archive thresholds.
    pub fn validate(&self) -> CoreResult<()> {
        if self.chunk_capacity == 0 {
            return Err(CoreError::InvalidConfig("chunk_capacity must be at least 1".into()));
        }
        self.archive.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.archive.promote_density, 0.15);
        assert_eq!(config.archive.demote_density, 0.05);
        assert_eq!(config.archive.min_entities_for_analysis, 1000);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = ArchiveConfig { promote_density: 0.1, demote_density: 0.2, ..Default::default() };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let config = ArchiveConfig { promote_density: 0.1, demote_density: 0.1, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_density_rejected() {
        let config = ArchiveConfig { promote_density: 1.5, ..Default::default() };
        assert!(config.validate().is_err());
        let config = ArchiveConfig { demote_density: -0.1, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_capacity_rejected() {
        let config = WorldConfig { chunk_capacity: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
