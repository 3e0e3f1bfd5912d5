//! March configuration with documented constants
//!
//! The geometric engine works in leagues and compares floating point
//! distances all the time. Every slack value and tie-breaking offset it
//! relies on lives here instead of being scattered through the code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{MarchError, Result};

/// Tunables for column movement, reform and deconfliction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchConfig {
    /// Distance the trail is pushed past a node it has just consumed during
    /// reform (leagues)
    ///
    /// Keeps lead and trail from being reported on the same node while they
    /// are still one hop apart. Any small positive value works; it only has
    /// to stay well below the shortest road on the map.
    pub reform_offset: f64,

    /// Slack for floating point distance comparisons (leagues)
    ///
    /// Two offsets closer than this are the same place, an extent within this
    /// of the maximum is not overstretched.
    pub tolerance: f64,

    /// Extra distance a deconflicted column moves beyond the other column's
    /// span (leagues)
    pub minimum_clearance: f64,

    /// Upper bound on reform iterations before the engine declares the
    /// column state corrupt
    ///
    /// A healthy reform finishes in one step per consumed waypoint plus one.
    pub max_reform_steps: usize,
}

impl Default for MarchConfig {
    fn default() -> Self {
        Self {
            reform_offset: 0.015,
            tolerance: 1e-9,
            minimum_clearance: 0.015,
            max_reform_steps: 10_000,
        }
    }
}

impl MarchConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(MarchError::Config(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }

        // The offset has to be visible above the comparison slack or it
        // stops separating lead and trail.
        if !(self.reform_offset > self.tolerance && self.reform_offset.is_finite()) {
            return Err(MarchError::Config(format!(
                "reform_offset ({}) must be finite and greater than tolerance ({})",
                self.reform_offset, self.tolerance
            )));
        }

        if !(self.minimum_clearance > self.tolerance && self.minimum_clearance.is_finite()) {
            return Err(MarchError::Config(format!(
                "minimum_clearance ({}) must be finite and greater than tolerance ({})",
                self.minimum_clearance, self.tolerance
            )));
        }

        if self.max_reform_steps == 0 {
            return Err(MarchError::Config("max_reform_steps must be at least 1".into()));
        }

        Ok(())
    }

    /// Parse and validate a config from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MarchConfig =
            toml::from_str(content).map_err(|e| MarchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a TOML file
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

// === GLOBAL CONFIG ACCESS ===

use std::sync::OnceLock;

static CONFIG: OnceLock<MarchConfig> = OnceLock::new();

/// Get the global march config (initializes with defaults if not set)
pub fn config() -> &'static MarchConfig {
    CONFIG.get_or_init(MarchConfig::default)
}

/// Set the global march config (can only be called once)
///
/// Returns Err if config was already set.
pub fn set_config(config: MarchConfig) -> std::result::Result<(), MarchConfig> {
    CONFIG.set(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MarchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_offset_must_exceed_tolerance() {
        let config = MarchConfig {
            reform_offset: 1e-12,
            ..MarchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MarchConfig::from_toml_str("reform_offset = 0.02\n").unwrap();
        assert_eq!(config.reform_offset, 0.02);
        assert_eq!(config.tolerance, MarchConfig::default().tolerance);
        assert_eq!(config.max_reform_steps, 10_000);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let result = MarchConfig::from_toml_str("reform_offset = \"wide\"");
        assert!(matches!(result, Err(MarchError::Config(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_parse() {
        let result = MarchConfig::from_toml_str("max_reform_steps = 0");
        assert!(matches!(result, Err(MarchError::Config(_))));
    }
}
