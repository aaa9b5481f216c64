//! Configuration system
//!
//! Collision tuning lives in [`CollisionConfig`], loadable from `.toml` or
//! `.ron` through the [`Config`] trait.

pub use serde::{Serialize, Deserialize};

use crate::foundation::math::Vec3;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::load_from_str(path, &contents)
    }

    /// Parse configuration text, picking the format from the path's extension
    fn load_from_str(path: &str, contents: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value parsed but is outside its valid range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Spatial hash grid settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// World-space size of one cell, fixed when the grid is built
    pub cell_size: Vec3,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: Vec3::new(4.0, 4.0, 4.0),
        }
    }
}

/// Narrow-phase settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatConfig {
    /// Normals/edges whose |dot| is within this of 1 are merged when building mesh shapes
    pub normal_dedup_tolerance: f32,
    /// Multiplier applied to an MTV when it is used to push bodies apart
    pub mtv_correction_factor: f32,
}

impl Default for SatConfig {
    fn default() -> Self {
        Self {
            normal_dedup_tolerance: 0.001,
            mtv_correction_factor: 1.1,
        }
    }
}

/// Projectile stepping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileSettings {
    /// Ticks a projectile lingers after a hit before returning to the pool
    pub hit_grace_ticks: u32,
    /// Distance along the shot over which a muzzle offset fades onto the launcher's center line
    pub trace_correction_distance: f32,
    /// Lifetime used when a spawn request does not give one
    pub default_lifetime_secs: f32,
}

impl Default for ProjectileSettings {
    fn default() -> Self {
        Self {
            hit_grace_ticks: 3,
            trace_correction_distance: 30.0,
            default_lifetime_secs: 5.0,
        }
    }
}

/// Mouse picking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    /// Longest distance a pick ray walks through the grid
    pub max_distance: f32,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self { max_distance: 1000.0 }
    }
}

/// Top-level collision configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Broad-phase grid
    pub grid: GridConfig,
    /// SAT narrow phase
    pub sat: SatConfig,
    /// Projectile stepping
    pub projectile: ProjectileSettings,
    /// Pick rays
    pub picking: PickingConfig,
}

impl Config for CollisionConfig {}

impl CollisionConfig {
    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cell = &self.grid.cell_size;
        if !(cell.x > 0.0 && cell.y > 0.0 && cell.z > 0.0) || !cell.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "grid.cell_size",
                reason: format!("every component must be positive and finite, got {cell:?}"),
            });
        }
        if !(0.0..1.0).contains(&self.sat.normal_dedup_tolerance) {
            return Err(ConfigError::Invalid {
                field: "sat.normal_dedup_tolerance",
                reason: format!("must be in [0, 1), got {}", self.sat.normal_dedup_tolerance),
            });
        }
        require_positive("sat.mtv_correction_factor", self.sat.mtv_correction_factor)?;
        require_positive("projectile.default_lifetime_secs", self.projectile.default_lifetime_secs)?;
        require_positive("projectile.trace_correction_distance", self.projectile.trace_correction_distance)?;
        require_positive("picking.max_distance", self.picking.max_distance)?;
        Ok(())
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive and finite, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = CollisionConfig::default();
        assert_eq!(config.grid.cell_size, Vec3::new(4.0, 4.0, 4.0));
        assert_relative_eq!(config.sat.normal_dedup_tolerance, 0.001);
        assert_eq!(config.projectile.hit_grace_ticks, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [grid]
            cell_size = [2.0, 2.0, 2.0]

            [projectile]
            hit_grace_ticks = 5
        "#;
        let config = CollisionConfig::load_from_str("collision.toml", text).unwrap();
        assert_eq!(config.grid.cell_size, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(config.projectile.hit_grace_ticks, 5);
        assert_relative_eq!(config.sat.mtv_correction_factor, 1.1);
    }

    #[test]
    fn test_ron_format() {
        let text = "(sat: (normal_dedup_tolerance: 0.01))";
        let config = CollisionConfig::load_from_str("collision.ron", text).unwrap();
        assert_relative_eq!(config.sat.normal_dedup_tolerance, 0.01);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = CollisionConfig::load_from_str("collision.json", "{}");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_validate_rejects_zero_cell() {
        let mut config = CollisionConfig::default();
        config.grid.cell_size = Vec3::new(4.0, 0.0, 4.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "grid.cell_size", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_scalars() {
        let mut config = CollisionConfig::default();
        config.sat.mtv_correction_factor = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "sat.mtv_correction_factor", .. })
        ));

        let mut config = CollisionConfig::default();
        config.projectile.default_lifetime_secs = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "projectile.default_lifetime_secs", .. })
        ));

        let mut config = CollisionConfig::default();
        config.projectile.trace_correction_distance = f32::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "projectile.trace_correction_distance", .. })
        ));

        let mut config = CollisionConfig::default();
        config.picking.max_distance = f32::NAN;
        assert!(config.validate().is_err());
    }
}
