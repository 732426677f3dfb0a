//! Index builder for flexible configuration
//!
//! This module provides a builder pattern for creating spatial indexes with
//! custom storage locations and decomposition settings.

use std::path::PathBuf;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::SpatialIndex;

/// Builder for index construction with a custom location and settings.
#[derive(Debug)]
pub struct IndexBuilder {
    path: Option<PathBuf>,
    config: IndexConfig,
    in_memory: bool,
}

impl IndexBuilder {
    /// Create a new builder with default in-memory configuration.
    pub fn new() -> Self {
        Self {
            path: None,
            config: IndexConfig::default(),
            in_memory: true,
        }
    }

    /// Set the storage location (directory plus name stem). Existing
    /// artifacts at the location are loaded on build.
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self.in_memory = false;
        self
    }

    /// Configure for in-memory operation with no persistence.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self.path = None;
        self
    }

    /// Set the index configuration (minimum cell area, maximum depth).
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the minimum cell area directly.
    pub fn min_cell_area(mut self, area: f64) -> Self {
        self.config = self.config.with_min_cell_area(area);
        self
    }

    /// Set the maximum decomposition depth directly.
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config = self.config.with_max_depth(depth);
        self
    }

    /// Build the index. Loads persisted artifacts if a location is set.
    pub fn build(self) -> Result<SpatialIndex> {
        match (self.in_memory, self.path) {
            (false, Some(path)) => SpatialIndex::open_with_config(path, self.config),
            _ => SpatialIndex::memory_with_config(self.config),
        }
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrence::Attributes;

    #[test]
    fn test_builder_default() {
        let builder = IndexBuilder::new();
        assert!(builder.in_memory);
    }

    #[test]
    fn test_builder_in_memory() {
        let mut index = IndexBuilder::new().in_memory().build().unwrap();
        index
            .add_feature("a", "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))", Attributes::new())
            .unwrap();
        assert_eq!(index.search(0.5, 0.5).len(), 1);
    }

    #[test]
    fn test_builder_with_config() {
        let config = IndexConfig::new().with_min_cell_area(1.0).with_max_depth(4);
        let index = IndexBuilder::new().config(config).build().unwrap();
        assert_eq!(index.config().min_cell_area, 1.0);
        assert_eq!(index.config().max_depth, 4);
    }

    #[test]
    fn test_builder_inline_knobs() {
        let index = IndexBuilder::new()
            .min_cell_area(0.25)
            .max_depth(6)
            .build()
            .unwrap();
        assert_eq!(index.config().min_cell_area, 0.25);
        assert_eq!(index.config().max_depth, 6);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = IndexConfig::default();
        config.max_depth = 99;
        assert!(IndexBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn test_builder_path_disables_in_memory() {
        let builder = IndexBuilder::new().in_memory().path("/tmp/reserves");
        assert!(!builder.in_memory);
        assert!(builder.path.is_some());
    }

    #[test]
    fn test_builder_in_memory_clears_path() {
        let builder = IndexBuilder::new().path("/tmp/reserves").in_memory();
        assert!(builder.in_memory);
        assert!(builder.path.is_none());
    }

    #[test]
    fn test_builder_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("reserves");

        let mut index = IndexBuilder::new().path(&stem).build().unwrap();
        index
            .add_feature("sq", "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))", Attributes::new())
            .unwrap();
        index.save().unwrap();
        drop(index);

        let reopened = IndexBuilder::new().path(&stem).build().unwrap();
        assert_eq!(reopened.stats().feature_count, 1);
        #[cfg(feature = "snapshot")]
        assert_eq!(reopened.search(2.0, 2.0).len(), 1);
    }
}
