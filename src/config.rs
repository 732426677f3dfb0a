//! Index configuration.
//!
//! `IndexConfig` carries the two quadtree tuning knobs: the minimum quadrant
//! area below which decomposition stops splitting and stores the exact
//! remainder, and the maximum recursion depth. Both trade index size and
//! build time against query precision.

use serde::{Deserialize, Serialize};

/// Tuning parameters for quadtree decomposition.
///
/// # Examples
///
/// ```rust
/// use biotope::IndexConfig;
///
/// let config = IndexConfig::new()
///     .with_min_cell_area(0.001)
///     .with_max_depth(12);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Quadrants whose clipped area falls below this threshold stop
    /// splitting and store the exact remainder geometry.
    ///
    /// Units are squared map units (degrees² for geographic data).
    #[serde(default = "IndexConfig::default_min_cell_area")]
    pub min_cell_area: f64,

    /// Maximum quadtree recursion depth per feature (1-32).
    ///
    /// A depth of `d` can produce at most `4^d` cells for one feature.
    #[serde(default = "IndexConfig::default_max_depth")]
    pub max_depth: u32,
}

impl IndexConfig {
    const fn default_min_cell_area() -> f64 {
        0.01
    }

    const fn default_max_depth() -> u32 {
        10
    }

    /// Largest accepted `max_depth`.
    pub const MAX_DEPTH_LIMIT: u32 = 32;

    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum quadrant area.
    ///
    /// # Panics
    ///
    /// Panics if `min_cell_area` is not a positive finite number.
    pub fn with_min_cell_area(mut self, min_cell_area: f64) -> Self {
        assert!(
            min_cell_area.is_finite() && min_cell_area > 0.0,
            "Minimum cell area must be positive and finite"
        );
        self.min_cell_area = min_cell_area;
        self
    }

    /// Sets the maximum recursion depth.
    ///
    /// # Panics
    ///
    /// Panics if `max_depth` is zero or exceeds [`IndexConfig::MAX_DEPTH_LIMIT`].
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        assert!(
            (1..=Self::MAX_DEPTH_LIMIT).contains(&max_depth),
            "Maximum depth must be between 1 and 32"
        );
        self.max_depth = max_depth;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !self.min_cell_area.is_finite() {
            return Err("Minimum cell area must be finite (not NaN or infinity)".to_string());
        }
        if self.min_cell_area <= 0.0 {
            return Err("Minimum cell area must be positive".to_string());
        }
        if !(1..=Self::MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err("Maximum depth must be between 1 and 32".to_string());
        }
        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        use serde::de::Error;

        let config: IndexConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        use serde::de::Error;

        let config: IndexConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_cell_area: Self::default_min_cell_area(),
            max_depth: Self::default_max_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.min_cell_area, 0.01);
        assert_eq!(config.max_depth, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = IndexConfig::new()
            .with_min_cell_area(0.5)
            .with_max_depth(4);
        assert_eq!(config.min_cell_area, 0.5);
        assert_eq!(config.max_depth, 4);
    }

    #[test]
    #[should_panic(expected = "Minimum cell area must be positive")]
    fn test_zero_min_cell_area_panics() {
        let _ = IndexConfig::new().with_min_cell_area(0.0);
    }

    #[test]
    #[should_panic(expected = "Maximum depth must be between 1 and 32")]
    fn test_zero_max_depth_panics() {
        let _ = IndexConfig::new().with_max_depth(0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = IndexConfig {
            min_cell_area: -1.0,
            max_depth: 10,
        };
        assert!(config.validate().is_err());

        let config = IndexConfig {
            min_cell_area: f64::NAN,
            max_depth: 10,
        };
        assert!(config.validate().is_err());

        let config = IndexConfig {
            min_cell_area: 0.01,
            max_depth: 40,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = IndexConfig::new().with_min_cell_area(0.25).with_max_depth(6);
        let json = config.to_json().unwrap();
        let deserialized = IndexConfig::from_json(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_json_defaults_for_missing_fields() {
        let config = IndexConfig::from_json("{}").unwrap();
        assert_eq!(config, IndexConfig::default());
    }

    #[test]
    fn test_json_rejects_invalid() {
        assert!(IndexConfig::from_json(r#"{"min_cell_area": -2.0}"#).is_err());
        assert!(IndexConfig::from_json(r#"{"max_depth": 0}"#).is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = IndexConfig::new().with_max_depth(8);
        let toml_str = config.to_toml().unwrap();
        let deserialized = IndexConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }
}
