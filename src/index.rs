//! The spatial index: decomposed quadrant cells in an R-tree, with exact
//! geometry fallback for cells straddling feature boundaries.
//!
//! [`SpatialIndex`] answers "which registered features contain point
//! (x, y)?". Features are decomposed into cells on insertion; most cells are
//! fully covered and resolve by rectangle containment alone, only boundary
//! cells pay for an exact point-in-polygon test. Attribute and geometry
//! tables persist as JSON artifacts, the R-tree as a binary snapshot.

use std::fmt;
use std::path::{Path, PathBuf};

use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::builder::IndexBuilder;
use crate::config::IndexConfig;
use crate::error::{BiotopeError, Result};
use crate::geom::{self, GeometryInput};
use crate::occurrence::Attributes;
use crate::quadtree::{self, Coverage};
use crate::store::FeatureStore;
#[cfg(feature = "snapshot")]
use crate::store::{artifact_path, write_atomic};

#[cfg(feature = "snapshot")]
use std::fs::File;
#[cfg(feature = "snapshot")]
use std::io::{BufReader, Read};

/// Extension of the R-tree snapshot artifact.
pub const TREE_EXT: &str = "rtree";

#[cfg(feature = "snapshot")]
const TREE_MAGIC: &[u8] = b"BIOTOPE_RTREE";
#[cfg(feature = "snapshot")]
const TREE_VERSION: u8 = 1;

/// Coverage marker carried by every indexed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageTag {
    /// The cell lies entirely inside its feature; rectangle containment is
    /// sufficient at query time.
    Full,
    /// The cell straddles the feature boundary; the surrogate id points at
    /// the exact intersection geometry for disambiguation.
    Partial(u64),
}

/// One quadrant cell stored in the R-tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEntry {
    feature_id: String,
    tag: CoverageTag,
    min: [f64; 2],
    max: [f64; 2],
}

impl CellEntry {
    pub(crate) fn new(feature_id: &str, tag: CoverageTag, rect: &geo::Rect<f64>) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            tag,
            min: [rect.min().x, rect.min().y],
            max: [rect.max().x, rect.max().y],
        }
    }

    /// The owning feature's identifier.
    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    /// The cell's coverage marker.
    pub fn tag(&self) -> CoverageTag {
        self.tag
    }
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Aggregate index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    /// Features with a stored attribute record.
    pub feature_count: usize,
    /// Cells in the R-tree.
    pub cell_count: usize,
    /// Stored partial-coverage geometries.
    pub partial_geometry_count: usize,
}

/// A point-containment index over polygon features.
///
/// The index itself is single-threaded: `add_feature` takes `&mut self`,
/// `search` takes `&self` and is safe to call concurrently once building is
/// done.
/// For shared multi-threaded access wrap it in
/// [`SyncIndex`](crate::sync::SyncIndex) (feature `sync`).
///
/// # Examples
///
/// ```rust
/// use biotope::{Attributes, SpatialIndex};
///
/// let mut index = SpatialIndex::memory();
/// index.add_feature(
///     "pond",
///     "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))",
///     Attributes::new(),
/// )?;
///
/// assert!(index.search(5.0, 5.0).contains_key("pond"));
/// assert!(index.search(50.0, 50.0).is_empty());
/// # Ok::<(), biotope::BiotopeError>(())
/// ```
pub struct SpatialIndex {
    tree: RTree<CellEntry>,
    store: FeatureStore,
    config: IndexConfig,
    location: Option<PathBuf>,
}

impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("config", &self.config)
            .field("location", &self.location)
            .field("features", &self.store.feature_count())
            .field("cells", &self.tree.size())
            .finish()
    }
}

impl SpatialIndex {
    /// Creates an in-memory index with default configuration.
    ///
    /// In-memory indexes cannot [`save`](Self::save) until relocated with
    /// [`save_as`](Self::save_as).
    pub fn memory() -> Self {
        Self {
            tree: RTree::new(),
            store: FeatureStore::new(),
            config: IndexConfig::default(),
            location: None,
        }
    }

    /// Creates an in-memory index with a custom configuration.
    pub fn memory_with_config(config: IndexConfig) -> Result<Self> {
        config.validate().map_err(BiotopeError::InvalidConfig)?;
        let mut index = Self::memory();
        index.config = config;
        Ok(index)
    }

    /// Opens the index named by `path` (directory plus name stem), loading
    /// any persisted artifacts. A location with no artifacts opens empty;
    /// that is the normal first run, not an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, IndexConfig::default())
    }

    /// Opens the index named by `path` with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BiotopeError::InvalidConfig`] for a rejected configuration
    /// and [`BiotopeError::Persistence`] when an artifact exists but cannot
    /// be decoded.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        config.validate().map_err(BiotopeError::InvalidConfig)?;
        let stem = path.as_ref().to_path_buf();
        let store = FeatureStore::load(&stem)?;
        let tree = load_tree(&stem)?;
        Ok(Self {
            tree,
            store,
            config,
            location: Some(stem),
        })
    }

    /// Starts building an index with a fluent configuration surface.
    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    /// The active configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The storage location, if the index has one.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Registers a feature: stores its attributes, decomposes its geometry,
    /// and indexes the resulting cells.
    ///
    /// `geometry` is a WKT string or a pre-built shape
    /// ([`geo::MultiPolygon`], [`geo::Polygon`], [`geo::Rect`]).
    ///
    /// Re-using an identifier overwrites the attribute record but leaves
    /// previously indexed cells in place: last attributes win, cells
    /// accumulate. Callers wanting replacement semantics must rebuild.
    ///
    /// # Errors
    ///
    /// * [`BiotopeError::GeometryParse`] - the WKT does not parse.
    /// * [`BiotopeError::InvalidGeometry`] - parsed but unusable (not areal,
    ///   or degenerate zero-area envelope).
    ///
    /// The attribute record goes in before the geometry is touched, so it
    /// survives either error and the feature stays queryable out of band;
    /// no cells are created for a rejected geometry.
    ///
    /// Cell insertion is atomic per feature: decomposition runs to
    /// completion before any cell reaches the tree.
    pub fn add_feature<'a, I, G>(
        &mut self,
        identifier: I,
        geometry: G,
        attributes: Attributes,
    ) -> Result<()>
    where
        I: ToString,
        G: Into<GeometryInput<'a>>,
    {
        let feature_id = identifier.to_string();
        // Attributes first: a feature whose geometry is rejected keeps its
        // record and stays queryable out of band.
        self.store.put_attributes(feature_id.clone(), attributes);

        let geometry = geometry.into().into_multi_polygon()?;

        let bounds = match geom::envelope(&geometry) {
            Some(bounds) if !geom::is_degenerate(&bounds) => bounds,
            _ => {
                return Err(BiotopeError::InvalidGeometry(format!(
                    "feature '{feature_id}' has a degenerate zero-area envelope"
                )));
            }
        };

        let entries = quadtree::decompose(
            &geometry,
            bounds,
            self.config.min_cell_area,
            self.config.max_depth,
        );

        // Stage everything first; the tree sees either all cells or none.
        let mut staged = Vec::with_capacity(entries.len());
        for entry in entries {
            let tag = match entry.coverage {
                Coverage::Full => CoverageTag::Full,
                Coverage::Partial(remainder) => {
                    CoverageTag::Partial(self.store.insert_geometry(remainder))
                }
            };
            staged.push(CellEntry::new(&feature_id, tag, &entry.rect));
        }
        for cell in staged {
            self.tree.insert(cell);
        }
        Ok(())
    }

    /// Returns the attribute records of every feature containing the point,
    /// keyed by feature identifier.
    ///
    /// Containment is boundary-inclusive: a point exactly on a feature's
    /// edge reports that feature. Each feature appears at most once no
    /// matter how many of its cells contain the point. No match is an empty
    /// map, never an error.
    pub fn search(&self, x: f64, y: f64) -> FxHashMap<String, Attributes> {
        let query = AABB::from_point([x, y]);
        let mut results: FxHashMap<String, Attributes> = FxHashMap::default();
        for cell in self.tree.locate_in_envelope_intersecting(&query) {
            if results.contains_key(cell.feature_id()) {
                continue;
            }
            let inside = match cell.tag() {
                CoverageTag::Full => true,
                CoverageTag::Partial(geometry_id) => match self.store.geometry(geometry_id) {
                    Some(geometry) => geom::covers_point(geometry, x, y),
                    None => {
                        log::warn!(
                            "cell for feature '{}' references missing geometry {geometry_id}",
                            cell.feature_id()
                        );
                        false
                    }
                },
            };
            if !inside {
                continue;
            }
            match self.store.attributes(cell.feature_id()) {
                Some(attributes) => {
                    results.insert(cell.feature_id().to_string(), attributes.clone());
                }
                None => log::warn!(
                    "feature '{}' has indexed cells but no attribute record",
                    cell.feature_id()
                ),
            }
        }
        results
    }

    /// Persists the attribute table, geometry table, and R-tree snapshot.
    ///
    /// Without the `snapshot` feature only the two JSON artifacts are
    /// written; a reopened index then starts with an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`BiotopeError::NoStorageLocation`] for an in-memory index.
    pub fn save(&self) -> Result<()> {
        let Some(stem) = &self.location else {
            return Err(BiotopeError::NoStorageLocation);
        };
        self.store.save(stem)?;
        save_tree(&self.tree, stem)?;
        Ok(())
    }

    /// Assigns a storage location, then saves.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.location = Some(path.as_ref().to_path_buf());
        self.save()
    }

    /// Aggregate statistics over the index.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            feature_count: self.store.feature_count(),
            cell_count: self.tree.size(),
            partial_geometry_count: self.store.geometry_count(),
        }
    }

    /// Whether the index holds no features.
    pub fn is_empty(&self) -> bool {
        self.store.feature_count() == 0 && self.tree.size() == 0
    }
}

#[cfg(feature = "snapshot")]
fn load_tree(stem: &Path) -> Result<RTree<CellEntry>> {
    let path = artifact_path(stem, TREE_EXT);
    if !path.exists() {
        return Ok(RTree::new());
    }
    let file = File::open(&path)?;
    if file.metadata()?.len() == 0 {
        return Ok(RTree::new());
    }

    let mut reader = BufReader::new(file);
    let mut magic = vec![0u8; TREE_MAGIC.len()];
    reader
        .read_exact(&mut magic)
        .map_err(|e| BiotopeError::corrupt(&path, e))?;
    if magic != TREE_MAGIC {
        return Err(BiotopeError::corrupt(&path, "bad snapshot magic"));
    }
    let mut version = [0u8; 1];
    reader
        .read_exact(&mut version)
        .map_err(|e| BiotopeError::corrupt(&path, e))?;
    if version[0] != TREE_VERSION {
        return Err(BiotopeError::corrupt(
            &path,
            format!("unsupported snapshot version {}", version[0]),
        ));
    }
    bincode::deserialize_from(reader).map_err(|e| BiotopeError::corrupt(&path, e))
}

#[cfg(not(feature = "snapshot"))]
fn load_tree(_stem: &Path) -> Result<RTree<CellEntry>> {
    Ok(RTree::new())
}

#[cfg(feature = "snapshot")]
fn save_tree(tree: &RTree<CellEntry>, stem: &Path) -> Result<()> {
    let path = artifact_path(stem, TREE_EXT);
    let mut payload = Vec::new();
    payload.extend_from_slice(TREE_MAGIC);
    payload.push(TREE_VERSION);
    bincode::serialize_into(&mut payload, tree).map_err(|e| BiotopeError::corrupt(&path, e))?;
    write_atomic(&path, &payload)
}

#[cfg(not(feature = "snapshot"))]
fn save_tree(_tree: &RTree<CellEntry>, _stem: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrence::AttributeValue;

    fn attrs(name: &str) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), name.into());
        attributes
    }

    #[test]
    fn test_full_cell_hit() {
        let mut index = SpatialIndex::memory();
        index
            .add_feature("square", "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))", attrs("sq"))
            .unwrap();

        let results = index.search(5.0, 5.0);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results["square"].get("name").and_then(|v| v.as_str()),
            Some("sq")
        );
    }

    #[test]
    fn test_partial_cell_requires_exact_containment() {
        let mut index = SpatialIndex::memory();
        // Right triangle: the upper-right half of its envelope is empty.
        index
            .add_feature("tri", "POLYGON ((0 0, 10 0, 0 10, 0 0))", attrs("tri"))
            .unwrap();

        assert_eq!(index.search(2.0, 2.0).len(), 1);
        // Inside the envelope but outside the triangle.
        assert!(index.search(9.0, 9.0).is_empty());
    }

    #[test]
    fn test_search_miss_is_empty_map() {
        let mut index = SpatialIndex::memory();
        index
            .add_feature(1, "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))", attrs("a"))
            .unwrap();
        assert!(index.search(100.0, 100.0).is_empty());
    }

    #[test]
    fn test_feature_returned_once_despite_many_cells() {
        let config = IndexConfig::new().with_min_cell_area(0.5).with_max_depth(4);
        let mut index = SpatialIndex::memory_with_config(config).unwrap();
        index
            .add_feature("tri", "POLYGON ((0 0, 16 0, 0 16, 0 0))", attrs("tri"))
            .unwrap();
        assert!(index.stats().cell_count > 1, "decomposition should split");
        let results = index.search(1.0, 1.0);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_boundary_point_is_contained() {
        let mut index = SpatialIndex::memory();
        index
            .add_feature("square", "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))", attrs("sq"))
            .unwrap();
        assert_eq!(index.search(0.0, 5.0).len(), 1);
        assert_eq!(index.search(10.0, 10.0).len(), 1);
    }

    #[test]
    fn test_duplicate_identifier_keeps_last_attributes() {
        let mut index = SpatialIndex::memory();
        index
            .add_feature("dup", "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))", attrs("first"))
            .unwrap();
        index
            .add_feature("dup", "POLYGON ((20 0, 30 0, 30 10, 20 10, 20 0))", attrs("second"))
            .unwrap();

        // Old cells stay queryable, but attributes come from the last write.
        let results = index.search(5.0, 5.0);
        assert_eq!(
            results["dup"].get("name").and_then(|v| v.as_str()),
            Some("second")
        );
        let results = index.search(25.0, 5.0);
        assert_eq!(
            results["dup"].get("name").and_then(|v| v.as_str()),
            Some("second")
        );
        assert_eq!(index.stats().feature_count, 1);
    }

    #[test]
    fn test_unparseable_wkt_keeps_attributes_only() {
        let mut index = SpatialIndex::memory();
        let err = index
            .add_feature("bad", "POLYGON ((oops", attrs("bad"))
            .unwrap_err();
        assert!(matches!(err, BiotopeError::GeometryParse(_)));
        // The record went in before parsing, same as any rejected geometry.
        assert_eq!(index.stats().feature_count, 1);
        assert_eq!(index.stats().cell_count, 0);
    }

    #[test]
    fn test_degenerate_geometry_keeps_attributes_only() {
        let mut index = SpatialIndex::memory();
        // Zero-width polygon: envelope collapses to a vertical line.
        let err = index
            .add_feature("line", "POLYGON ((0 0, 0 10, 0 0))", attrs("line"))
            .unwrap_err();
        assert!(matches!(err, BiotopeError::InvalidGeometry(_)));
        assert_eq!(index.stats().feature_count, 1);
        assert_eq!(index.stats().cell_count, 0);
        assert!(index.search(0.0, 5.0).is_empty());
    }

    #[test]
    fn test_non_areal_wkt_keeps_attributes_only() {
        let mut index = SpatialIndex::memory();
        let err = index
            .add_feature("pt", "POINT (3 4)", attrs("pt"))
            .unwrap_err();
        assert!(matches!(err, BiotopeError::InvalidGeometry(_)));
        assert_eq!(index.stats().feature_count, 1);
        assert_eq!(index.stats().cell_count, 0);
    }

    #[test]
    fn test_save_without_location_fails() {
        let mut index = SpatialIndex::memory();
        index
            .add_feature("square", "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))", attrs("sq"))
            .unwrap();
        assert!(matches!(index.save(), Err(BiotopeError::NoStorageLocation)));
    }

    #[test]
    fn test_prebuilt_shapes_are_accepted() {
        use geo::coord;

        let mut index = SpatialIndex::memory();
        let rect = geo::Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 4.0, y: 4.0 });
        index.add_feature("rect", rect, attrs("rect")).unwrap();
        assert_eq!(index.search(2.0, 2.0).len(), 1);
    }

    #[test]
    fn test_stats_reflect_contents() {
        let mut index = SpatialIndex::memory();
        assert!(index.is_empty());
        index
            .add_feature("sq", "POLYGON ((0 0, 8 0, 8 8, 0 8, 0 0))", attrs("sq"))
            .unwrap();
        let stats = index.stats();
        assert_eq!(stats.feature_count, 1);
        assert_eq!(stats.cell_count, 1, "an envelope-filling square is one full cell");
        assert_eq!(stats.partial_geometry_count, 0);
        assert!(!index.is_empty());

        index
            .add_feature("tri", "POLYGON ((20 0, 36 0, 20 16, 20 0))", attrs("tri"))
            .unwrap();
        let stats = index.stats();
        assert_eq!(stats.feature_count, 2);
        assert!(stats.cell_count > 2);
        assert!(stats.partial_geometry_count > 0);
    }

    #[test]
    fn test_attribute_values_surface_in_results() {
        let mut index = SpatialIndex::memory();
        let mut attributes = Attributes::new();
        attributes.insert("protected".to_string(), true.into());
        attributes.insert("iucn_class".to_string(), AttributeValue::Int(2));
        index
            .add_feature(42, "POLYGON ((0 0, 2 0, 2 2, 0 2, 0 0))", attributes)
            .unwrap();

        let results = index.search(1.0, 1.0);
        let record = &results["42"];
        assert_eq!(record.get("protected").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(record.get("iucn_class"), Some(&AttributeValue::Int(2)));
    }
}
