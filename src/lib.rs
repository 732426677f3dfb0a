//! Two-level spatial index for biological occurrence data: polygon features
//! decomposed into quadtree cells, indexed in an R-tree, with wranglers for
//! cleaning occurrence record sets.
//!
//! ```rust
//! use biotope::{Attributes, SpatialIndex};
//!
//! let mut index = SpatialIndex::memory();
//! index.add_feature(
//!     "reserve",
//!     "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))",
//!     Attributes::new(),
//! )?;
//!
//! let hits = index.search(5.0, 5.0);
//! assert!(hits.contains_key("reserve"));
//! # Ok::<(), biotope::BiotopeError>(())
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod geom;
pub mod index;
pub mod occurrence;
pub mod quadtree;
pub mod store;
pub mod wrangle;

#[cfg(feature = "sync")]
pub mod sync;

pub use builder::IndexBuilder;
pub use error::{BiotopeError, Result};
pub use index::{CellEntry, CoverageTag, IndexStats, SpatialIndex, TREE_EXT};

pub type Biotope = SpatialIndex;

pub use geo::{MultiPolygon, Polygon, Rect};

pub use config::IndexConfig;

pub use geom::GeometryInput;

pub use occurrence::{AttributeValue, Attributes, Occurrence};

pub use quadtree::{Coverage, QuadrantEntry};

pub use store::FeatureStore;

pub use wrangle::{
    Assessment, OccurrenceWrangler, WranglerConfig, WranglerPipeline, WranglerReport,
};

#[cfg(feature = "sync")]
pub use sync::SyncIndex;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Biotope, BiotopeError, IndexBuilder, Result, SpatialIndex};

    pub use geo::{MultiPolygon, Polygon, Rect};

    pub use crate::{AttributeValue, Attributes, IndexConfig, Occurrence};

    pub use crate::{OccurrenceWrangler, WranglerPipeline};

    #[cfg(feature = "sync")]
    pub use crate::SyncIndex;
}
