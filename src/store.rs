//! Feature attribute and geometry tables with artifact persistence.
//!
//! A named index persists two JSON artifacts next to its coarse-index
//! snapshot: `<name>.json` (feature id → attribute record) and
//! `<name>.geom_json` (surrogate geometry id → WKT). Artifacts are written
//! synchronously and atomically replace their predecessors; absent artifacts
//! load as empty state.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BiotopeError, Result};
use crate::geom;
use crate::occurrence::Attributes;

/// Extension of the attribute-table artifact.
pub const ATTRIBUTE_EXT: &str = "json";
/// Extension of the geometry-table artifact.
pub const GEOMETRY_EXT: &str = "geom_json";

/// In-memory feature state: attributes by feature id, exact partial
/// geometries by surrogate id, and the monotonic surrogate counter.
#[derive(Debug, Default)]
pub struct FeatureStore {
    attributes: FxHashMap<String, Attributes>,
    geometries: FxHashMap<u64, MultiPolygon<f64>>,
    next_geometry_id: u64,
}

impl FeatureStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store persisted under `stem`, treating missing artifacts
    /// as empty state.
    ///
    /// # Errors
    ///
    /// Returns [`BiotopeError::Persistence`] when an artifact is present but
    /// cannot be decoded, including geometry rows whose WKT no longer parses.
    pub fn load(stem: &Path) -> Result<Self> {
        let mut store = Self::new();

        let attribute_path = artifact_path(stem, ATTRIBUTE_EXT);
        if let Some(table) = read_json::<BTreeMap<String, Attributes>>(&attribute_path)? {
            store.attributes = table.into_iter().collect();
        }

        let geometry_path = artifact_path(stem, GEOMETRY_EXT);
        if let Some(table) = read_json::<BTreeMap<String, String>>(&geometry_path)? {
            for (key, wkt) in table {
                let id: u64 = key.parse().map_err(|_| {
                    BiotopeError::corrupt(
                        &geometry_path,
                        format!("non-numeric geometry id '{key}'"),
                    )
                })?;
                let geometry = geom::parse_wkt(&wkt)
                    .map_err(|e| BiotopeError::corrupt(&geometry_path, e))?;
                store.geometries.insert(id, geometry);
            }
            store.next_geometry_id = match store.geometries.keys().max() {
                Some(largest) => largest.checked_add(1).ok_or_else(|| {
                    BiotopeError::corrupt(
                        &geometry_path,
                        format!("geometry id {largest} leaves no id space for new rows"),
                    )
                })?,
                None => 0,
            };
        }

        Ok(store)
    }

    /// Writes both artifacts under `stem`, atomically replacing any
    /// previous versions.
    pub fn save(&self, stem: &Path) -> Result<()> {
        let attributes: BTreeMap<&String, &Attributes> = self.attributes.iter().collect();
        write_json_atomic(&artifact_path(stem, ATTRIBUTE_EXT), &attributes)?;

        let geometries: BTreeMap<String, String> = self
            .geometries
            .iter()
            .map(|(id, geometry)| (id.to_string(), geom::to_wkt(geometry)))
            .collect();
        write_json_atomic(&artifact_path(stem, GEOMETRY_EXT), &geometries)?;
        Ok(())
    }

    /// Stores a feature's attribute record, overwriting any prior record.
    pub fn put_attributes(&mut self, feature_id: String, attributes: Attributes) {
        self.attributes.insert(feature_id, attributes);
    }

    /// Looks up a feature's attribute record.
    pub fn attributes(&self, feature_id: &str) -> Option<&Attributes> {
        self.attributes.get(feature_id)
    }

    /// Stores a partial-coverage geometry under the next surrogate id.
    pub fn insert_geometry(&mut self, geometry: MultiPolygon<f64>) -> u64 {
        let id = self.next_geometry_id;
        self.next_geometry_id += 1;
        self.geometries.insert(id, geometry);
        id
    }

    /// Looks up a stored partial-coverage geometry.
    pub fn geometry(&self, id: u64) -> Option<&MultiPolygon<f64>> {
        self.geometries.get(&id)
    }

    /// Number of features with stored attributes.
    pub fn feature_count(&self) -> usize {
        self.attributes.len()
    }

    /// Number of stored partial-coverage geometries.
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// The next surrogate id that will be handed out.
    pub fn next_geometry_id(&self) -> u64 {
        self.next_geometry_id
    }
}

/// Builds `<stem>.<extension>` without touching dots inside the stem itself.
pub(crate) fn artifact_path(stem: &Path, extension: &str) -> PathBuf {
    let mut joined = stem.as_os_str().to_os_string();
    joined.push(".");
    joined.push(extension);
    PathBuf::from(joined)
}

/// Reads and decodes a JSON artifact. `Ok(None)` when the file is missing
/// or empty (both are normal first-run states).
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    let value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| BiotopeError::corrupt(path, e))?;
    Ok(Some(value))
}

/// Serializes `value` as JSON and atomically replaces `path` with it:
/// write to a temp sibling, flush, fsync, rename, fsync the parent dir.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload =
        serde_json::to_vec_pretty(value).map_err(|e| BiotopeError::corrupt(path, e))?;
    write_atomic(path, &payload)
}

/// Atomically replaces `path` with `payload`.
pub(crate) fn write_atomic(path: &Path, payload: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(payload)?;
    file.flush()?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)?;
    sync_parent_dir(path)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    if let Some(name) = temp.file_name() {
        let mut new_name = name.to_string_lossy().into_owned();
        new_name.push_str(".tmp");
        temp.set_file_name(new_name);
    }
    temp
}

fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrence::AttributeValue;
    use tempfile::tempdir;

    fn sample_store() -> FeatureStore {
        let mut store = FeatureStore::new();
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), "Shawnee forest".into());
        attrs.insert("area_ha".to_string(), AttributeValue::Float(1125.5));
        store.put_attributes("forest-1".to_string(), attrs);

        let wedge = geom::parse_wkt("POLYGON ((0 0, 4 0, 0 4, 0 0))").unwrap();
        let id = store.insert_geometry(wedge);
        assert_eq!(id, 0);
        store
    }

    #[test]
    fn test_surrogate_ids_are_monotonic() {
        let mut store = FeatureStore::new();
        let square = geom::parse_wkt("POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        assert_eq!(store.insert_geometry(square.clone()), 0);
        assert_eq!(store.insert_geometry(square.clone()), 1);
        assert_eq!(store.insert_geometry(square), 2);
        assert_eq!(store.next_geometry_id(), 3);
    }

    #[test]
    fn test_artifact_roundtrip() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("counties");

        let store = sample_store();
        store.save(&stem).unwrap();

        let loaded = FeatureStore::load(&stem).unwrap();
        assert_eq!(loaded.feature_count(), 1);
        assert_eq!(loaded.geometry_count(), 1);
        assert_eq!(
            loaded
                .attributes("forest-1")
                .and_then(|a| a.get("name"))
                .and_then(|v| v.as_str()),
            Some("Shawnee forest")
        );
        let geometry = loaded.geometry(0).expect("geometry row survives");
        assert_eq!(geom::area(geometry), 8.0);
        // Counter resumes after the largest persisted id.
        assert_eq!(loaded.next_geometry_id(), 1);
    }

    #[test]
    fn test_load_missing_artifacts_is_empty_state() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("never_saved");
        let store = FeatureStore::load(&stem).unwrap();
        assert_eq!(store.feature_count(), 0);
        assert_eq!(store.geometry_count(), 0);
        assert_eq!(store.next_geometry_id(), 0);
    }

    #[test]
    fn test_load_corrupt_attribute_artifact_fails() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("broken");
        std::fs::write(artifact_path(&stem, ATTRIBUTE_EXT), b"{ not json").unwrap();

        let err = FeatureStore::load(&stem).unwrap_err();
        assert!(matches!(err, BiotopeError::Persistence { .. }));
    }

    #[test]
    fn test_load_corrupt_geometry_wkt_fails() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("badgeom");
        std::fs::write(
            artifact_path(&stem, GEOMETRY_EXT),
            br#"{"0": "POLYGON ((broken"}"#,
        )
        .unwrap();

        let err = FeatureStore::load(&stem).unwrap_err();
        assert!(matches!(err, BiotopeError::Persistence { .. }));
    }

    #[test]
    fn test_load_non_numeric_geometry_id_fails() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("badkey");
        std::fs::write(
            artifact_path(&stem, GEOMETRY_EXT),
            br#"{"first": "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))"}"#,
        )
        .unwrap();

        let err = FeatureStore::load(&stem).unwrap_err();
        assert!(matches!(err, BiotopeError::Persistence { .. }));
    }

    #[test]
    fn test_load_geometry_id_at_u64_max_fails() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("maxed");
        std::fs::write(
            artifact_path(&stem, GEOMETRY_EXT),
            br#"{"18446744073709551615": "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))"}"#,
        )
        .unwrap();

        // u64::MAX as a stored id leaves no room for the next surrogate.
        let err = FeatureStore::load(&stem).unwrap_err();
        assert!(matches!(err, BiotopeError::Persistence { .. }));
    }

    #[test]
    fn test_empty_artifact_file_loads_as_empty_state() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("zero");
        std::fs::write(artifact_path(&stem, ATTRIBUTE_EXT), b"").unwrap();

        let store = FeatureStore::load(&stem).unwrap();
        assert_eq!(store.feature_count(), 0);
    }

    #[test]
    fn test_save_overwrites_previous_artifacts() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("evolving");

        sample_store().save(&stem).unwrap();

        let mut bigger = sample_store();
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), "Cache wetland".into());
        bigger.put_attributes("wetland-2".to_string(), attrs);
        bigger.save(&stem).unwrap();

        let loaded = FeatureStore::load(&stem).unwrap();
        assert_eq!(loaded.feature_count(), 2);
    }
}
