//! Error types for tile decoding and persistence.

use std::path::PathBuf;

use crate::storage::TileKey;

/// A persisted blob that cannot be decoded into a tile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileError {
    #[error("Invalid tile blob length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors raised by a [`crate::storage::TileBackend`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on tile {key}: {source}")]
    Io {
        key: TileKey,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create tile directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
