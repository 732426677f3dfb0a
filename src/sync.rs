//! Thread-safe wrapper for concurrent index access.
//!
//! This module provides `SyncIndex`, a thread-safe wrapper around
//! `SpatialIndex` that uses `Arc<RwLock<SpatialIndex>>` internally to allow
//! safe concurrent access from multiple threads.
//!
//! # Features
//!
//! Enable the `sync` feature to use this module:
//!
//! ```toml
//! [dependencies]
//! biotope = { version = "0.1", features = ["sync"] }
//! ```
//!
//! # Examples
//!
//! ```rust
//! use biotope::{Attributes, SyncIndex};
//! use std::thread;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let index = SyncIndex::memory();
//!
//! // Clone for use in another thread
//! let writer = index.clone();
//! let handle = thread::spawn(move || {
//!     writer
//!         .add_feature("reserve", "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))", Attributes::new())
//!         .unwrap();
//! });
//! handle.join().unwrap();
//!
//! assert!(index.search(5.0, 5.0).contains_key("reserve"));
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::geom::GeometryInput;
use crate::index::{IndexStats, SpatialIndex};
use crate::occurrence::Attributes;

/// Thread-safe wrapper around `SpatialIndex` using `Arc<RwLock<SpatialIndex>>`.
///
/// Multiple threads can search simultaneously; feature registration and
/// saving require exclusive access.
///
/// - Implements `Clone` for easy sharing between threads
/// - `search`, `stats`, `config`, and `is_empty` take a read lock
/// - `add_feature`, `save`, and `save_as` take a write lock; saves write
///   through shared temp files and must not overlap
#[derive(Clone)]
pub struct SyncIndex {
    inner: Arc<RwLock<SpatialIndex>>,
}

impl SyncIndex {
    /// Creates a new in-memory index with default configuration.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SpatialIndex::memory())),
        }
    }

    /// Creates a new in-memory index with custom configuration.
    pub fn memory_with_config(config: IndexConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(RwLock::new(SpatialIndex::memory_with_config(config)?)),
        })
    }

    /// Opens an index at the specified location, loading persisted artifacts.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(RwLock::new(SpatialIndex::open(path)?)),
        })
    }

    /// Opens an index at the specified location with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(RwLock::new(SpatialIndex::open_with_config(path, config)?)),
        })
    }

    /// Registers a feature. See [`SpatialIndex::add_feature`].
    pub fn add_feature<'a, I, G>(
        &self,
        identifier: I,
        geometry: G,
        attributes: Attributes,
    ) -> Result<()>
    where
        I: ToString,
        G: Into<GeometryInput<'a>>,
    {
        self.inner.write().add_feature(identifier, geometry, attributes)
    }

    /// Returns every feature containing the point. See
    /// [`SpatialIndex::search`].
    pub fn search(&self, x: f64, y: f64) -> FxHashMap<String, Attributes> {
        self.inner.read().search(x, y)
    }

    /// Persists all artifacts. See [`SpatialIndex::save`].
    ///
    /// Takes the write lock: concurrent saves would collide on the shared
    /// temp siblings the atomic-write path renames over.
    pub fn save(&self) -> Result<()> {
        self.inner.write().save()
    }

    /// Assigns a storage location, then saves. See
    /// [`SpatialIndex::save_as`].
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.inner.write().save_as(path)
    }

    /// Aggregate index statistics.
    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }

    /// Whether the index holds no features.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// The active configuration.
    pub fn config(&self) -> IndexConfig {
        *self.inner.read().config()
    }

    /// Acquires a read lock for direct access to the index.
    ///
    /// This allows multiple read operations under a single lock.
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, SpatialIndex> {
        self.inner.read()
    }

    /// Acquires a write lock for direct access to the index.
    ///
    /// This allows multiple write operations under a single lock.
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, SpatialIndex> {
        self.inner.write()
    }
}

// Ensure SyncIndex is Send + Sync
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<SyncIndex>;
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    fn square(origin: f64, size: f64) -> String {
        format!(
            "POLYGON (({o} {o}, {e} {o}, {e} {e}, {o} {e}, {o} {o}))",
            o = origin,
            e = origin + size
        )
    }

    #[test]
    fn test_basic_operations() {
        let index = SyncIndex::memory();
        index
            .add_feature("sq", square(0.0, 10.0), Attributes::new())
            .unwrap();
        assert_eq!(index.search(5.0, 5.0).len(), 1);
        assert!(index.search(50.0, 50.0).is_empty());
    }

    #[test]
    fn test_concurrent_searches() {
        let index = SyncIndex::memory();
        index
            .add_feature("sq", square(0.0, 10.0), Attributes::new())
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let index = index.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(index.search(5.0, 5.0).len(), 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_writes() {
        let index = SyncIndex::memory();

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let index = index.clone();
                thread::spawn(move || {
                    for j in 0..10 {
                        let id = format!("thread_{}_{}", i, j);
                        let origin = (i * 100 + j * 10) as f64;
                        index
                            .add_feature(&id, square(origin, 5.0), Attributes::new())
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.stats().feature_count, 50);
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        let index = SyncIndex::memory();
        for i in 0..10 {
            index
                .add_feature(format!("seed_{i}"), square(i as f64 * 50.0, 10.0), Attributes::new())
                .unwrap();
        }

        let mut handles = vec![];
        for _ in 0..5 {
            let index = index.clone();
            handles.push(thread::spawn(move || {
                for i in 0..10 {
                    let _ = index.search(i as f64 * 50.0 + 5.0, 5.0);
                }
            }));
        }
        for i in 0..3 {
            let index = index.clone();
            handles.push(thread::spawn(move || {
                for j in 0..10 {
                    let id = format!("writer_{}_{}", i, j);
                    let origin = 1000.0 + (i * 100 + j * 10) as f64;
                    index
                        .add_feature(&id, square(origin, 5.0), Attributes::new())
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.stats().feature_count, 40);
    }

    #[test]
    fn test_concurrent_saves_serialize() {
        let dir = tempdir().unwrap();
        let index = SyncIndex::open(dir.path().join("reserves")).unwrap();
        index
            .add_feature("sq", square(0.0, 10.0), Attributes::new())
            .unwrap();

        // Overlapping saves rename over the same temp siblings; the write
        // lock serializes them so every save lands.
        for round in 0..8 {
            let savers: Vec<_> = (0..2)
                .map(|_| {
                    let index = index.clone();
                    thread::spawn(move || index.save())
                })
                .collect();
            for handle in savers {
                handle
                    .join()
                    .unwrap()
                    .unwrap_or_else(|e| panic!("save failed in round {round}: {e}"));
            }
        }
    }

    #[test]
    fn test_clone_shares_state() {
        let index = SyncIndex::memory();
        index
            .add_feature("a", square(0.0, 10.0), Attributes::new())
            .unwrap();

        let clone = index.clone();
        assert_eq!(clone.search(5.0, 5.0).len(), 1);

        clone
            .add_feature("b", square(100.0, 10.0), Attributes::new())
            .unwrap();
        assert_eq!(index.search(105.0, 105.0).len(), 1);
    }

    #[test]
    fn test_direct_lock_access() {
        let index = SyncIndex::memory();
        {
            let mut guard = index.write();
            guard
                .add_feature("a", square(0.0, 10.0), Attributes::new())
                .unwrap();
            guard
                .add_feature("b", square(0.0, 20.0), Attributes::new())
                .unwrap();
        }
        let guard = index.read();
        assert_eq!(guard.search(5.0, 5.0).len(), 2);
    }
}
