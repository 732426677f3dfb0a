//! Error types for biotope operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BiotopeError>;

/// Errors produced by index construction, mutation, and persistence.
#[derive(Error, Debug)]
pub enum BiotopeError {
    /// A textual geometry could not be parsed as WKT.
    #[error("failed to parse geometry text: {0}")]
    GeometryParse(String),

    /// A geometry cannot be indexed (not areal, or degenerate zero-area envelope).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A persisted artifact could not be encoded or decoded.
    ///
    /// Absent artifacts are never an error; an index opened at a fresh
    /// location simply starts empty.
    #[error("persistence failure at {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    /// `save` was called on an in-memory index.
    #[error("index has no storage location; open it at a path or use save_as")]
    NoStorageLocation,

    /// An argument failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value or wrangler configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BiotopeError {
    /// Builds a `Persistence` error for `path` from any displayable cause.
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        BiotopeError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
