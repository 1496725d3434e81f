//! Byte-blob persistence for tiles
//!
//! Each tile is stored as one opaque blob addressed by a [`TileKey`]. The key
//! format is:
//!
//! ```text
//! tile_{x}_{y}
//! ```
//!
//! where `x` and `y` are the signed tile coordinates in decimal, e.g.
//! `tile_-3_12`. The encoding is bijective; [`TileKey::parse`] inverts it.
//!
//! Absence is a valid state: reading a tile that was never stored yields
//! `Ok(None)`, not an error.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::coords::TileCoord;
use crate::error::StorageError;

/// Stable, collision-free persistence key for a tile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey(String);

impl TileKey {
    const PREFIX: &'static str = "tile_";

    pub fn new(coord: TileCoord) -> Self {
        Self(format!("{}{}_{}", Self::PREFIX, coord.x, coord.y))
    }

    /// Recover the coordinate a key was built from
    pub fn parse(key: &str) -> Option<TileCoord> {
        let rest = key.strip_prefix(Self::PREFIX)?;
        // The separator is the first '_' after a leading sign or digit
        let split = rest.char_indices().skip(1).find(|&(_, c)| c == '_')?.0;
        let x = rest[..split].parse().ok()?;
        let y = rest[split + 1..].parse().ok()?;
        let coord = TileCoord::new(x, y);
        // Reject non-canonical spellings such as "+1" or "01"
        (Self::new(coord).0 == key).then_some(coord)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn coord(&self) -> Option<TileCoord> {
        Self::parse(&self.0)
    }
}

impl From<TileCoord> for TileKey {
    fn from(coord: TileCoord) -> Self {
        Self::new(coord)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable byte-blob store addressed by tile key.
///
/// Implementations must be safe to call from a flush thread while the input
/// thread keeps reading tiles.
pub trait TileBackend: Send + Sync {
    /// Stored blob for the key, or `None` if nothing was ever written
    fn read(&self, key: &TileKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the blob for the key
    fn write(&self, key: &TileKey, bytes: &[u8]) -> Result<(), StorageError>;

    /// Whether a blob exists for the key
    fn exists(&self, key: &TileKey) -> bool;
}

impl<T: TileBackend + ?Sized> TileBackend for Arc<T> {
    fn read(&self, key: &TileKey) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &TileKey, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(key, bytes)
    }

    fn exists(&self, key: &TileKey) -> bool {
        (**self).exists(key)
    }
}

/// One `<key>.bin` file per tile under a root directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Bind to a directory. It is created on the first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the blob for a key
    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        self.root.join(format!("{key}.bin"))
    }

    fn ensure_root(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::CreateDir {
            path: self.root.clone(),
            source,
        })
    }
}

impl TileBackend for FileBackend {
    fn read(&self, key: &TileKey) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.clone(),
                source,
            }),
        }
    }

    fn write(&self, key: &TileKey, bytes: &[u8]) -> Result<(), StorageError> {
        self.ensure_root()?;
        let path = self.path_for(key);
        // Write beside the target and rename so readers never see a partial blob
        let tmp = path.with_extension("bin.tmp");
        let io_err = |source| StorageError::Io {
            key: key.clone(),
            source,
        };
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        std::fs::rename(&tmp, &path).map_err(io_err)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn exists(&self, key: &TileKey) -> bool {
        self.path_for(key).is_file()
    }
}

/// Volatile backend keeping blobs in a map
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<TileKey, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<TileKey> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = blobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Store a raw blob directly, bypassing any tile encoding
    pub fn insert_raw(&self, key: TileKey, bytes: Vec<u8>) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, bytes);
    }
}

impl TileBackend for MemoryBackend {
    fn read(&self, key: &TileKey) -> Result<Option<Vec<u8>>, StorageError> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &TileKey, bytes: &[u8]) -> Result<(), StorageError> {
        self.insert_raw(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, key: &TileKey) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}
