//! Tile cache with modified-set tracking and batched persistence
//!
//! [`TileStore`] is the sole owner of every resident [`Tile`]. The cache and
//! the set of tiles modified since their last successful flush live behind a
//! single mutex. Each operation takes the lock once and releases it before
//! any backend read or write, so a flush running on another thread never
//! blocks pixel writes. Whole flushes are serialized by a second lock that
//! pixel writes never touch.

use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::coords::{split, CanvasRect, TileCoord, TileRange};
use crate::error::StorageError;
use crate::raster::{blank_raster, RasterHandle};
use crate::storage::{FileBackend, TileBackend, TileKey};
use crate::tile::Tile;

/// Cache and modified set, always mutated together
#[derive(Default)]
struct StoreState {
    tiles: HashMap<TileCoord, Tile>,
    modified: HashSet<TileCoord>,
}

/// A tile that could not be persisted during a flush
#[derive(Debug)]
pub struct FlushFailure {
    pub coord: TileCoord,
    pub error: StorageError,
}

/// Outcome of a [`TileStore::flush`]
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Tiles written successfully, in row-major order
    pub written: Vec<TileCoord>,
    /// Tiles whose write failed; they stay modified for the next flush
    pub failed: Vec<FlushFailure>,
}

impl FlushReport {
    /// True if every modified tile was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// True if there was nothing to flush
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.failed.is_empty()
    }

    pub fn failed_coords(&self) -> Vec<TileCoord> {
        self.failed.iter().map(|f| f.coord).collect()
    }
}

/// Serialized copy of a modified tile, taken under the lock
struct Snapshot {
    coord: TileCoord,
    revision: u64,
    bytes: Vec<u8>,
}

/// Shared reference to a resident tile.
///
/// Holds the store lock for its lifetime, which stalls pixel writes and flush
/// bookkeeping on every thread. Keep it short-lived and drop it before calling
/// back into the store. Renderers should use [`TileStore::raster`] or
/// [`TileStore::with_tile`] instead.
pub struct TileRef<'a> {
    guard: MutexGuard<'a, StoreState>,
    coord: TileCoord,
}

impl Deref for TileRef<'_> {
    type Target = Tile;

    fn deref(&self) -> &Tile {
        // Inserted before the guard was handed out and never removed while it is held
        &self.guard.tiles[&self.coord]
    }
}

/// In-memory cache of tiles over a persistence backend
pub struct TileStore<B: TileBackend = FileBackend> {
    backend: B,
    state: Mutex<StoreState>,
    /// Held for the whole of a flush, never while `state` is wanted for drawing
    flushing: Mutex<()>,
}

impl TileStore<FileBackend> {
    /// Store persisting to one file per tile under `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(dir))
    }
}

impl<B: TileBackend> TileStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(StoreState::default()),
            flushing: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A panic elsewhere must not take the drawing session down with it
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a tile from the backend, fabricating an empty one when absent or unreadable
    fn load(&self, coord: TileCoord) -> Tile {
        let key = TileKey::new(coord);
        match self.backend.read(&key) {
            Ok(Some(bytes)) => {
                debug!("Loaded tile {} ({} bytes)", key, bytes.len());
                Tile::deserialize(coord, &bytes)
            }
            Ok(None) => Tile::new(coord),
            Err(err) => {
                warn!("Failed to read tile {}, starting empty: {}", key, err);
                Tile::new(coord)
            }
        }
    }

    /// Lock the store with `coord` resident, loading it first if needed.
    ///
    /// The backend read happens outside the lock. If another thread made the
    /// tile resident during the read, its copy wins.
    fn resident(&self, coord: TileCoord) -> MutexGuard<'_, StoreState> {
        {
            let state = self.lock();
            if state.tiles.contains_key(&coord) {
                return state;
            }
        }
        let loaded = self.load(coord);
        let mut state = self.lock();
        state.tiles.entry(coord).or_insert(loaded);
        state
    }

    /// Resident tile at `coord`, loaded or created on first access
    pub fn get_or_create(&self, coord: TileCoord) -> TileRef<'_> {
        TileRef {
            guard: self.resident(coord),
            coord,
        }
    }

    /// Run `f` against the tile at `coord`
    pub fn with_tile<R>(&self, coord: TileCoord, f: impl FnOnce(&Tile) -> R) -> R {
        let tile = self.get_or_create(coord);
        f(&*tile)
    }

    /// Write one local pixel, returning whether it changed.
    ///
    /// Only a real change marks the tile modified.
    pub fn set_pixel(&self, coord: TileCoord, local_x: u32, local_y: u32, filled: bool) -> bool {
        let mut guard = self.resident(coord);
        let state = &mut *guard;
        let changed = state
            .tiles
            .get_mut(&coord)
            .is_some_and(|tile| tile.set_pixel(local_x, local_y, filled));
        if changed {
            state.modified.insert(coord);
        }
        changed
    }

    /// Write one canvas pixel, routing it to the owning tile
    pub fn set_canvas_pixel(&self, px: i32, py: i32, filled: bool) -> bool {
        let (coord, lx, ly) = split(px, py);
        self.set_pixel(coord, lx, ly, filled)
    }

    /// Read one canvas pixel
    pub fn canvas_pixel(&self, px: i32, py: i32) -> bool {
        let (coord, lx, ly) = split(px, py);
        self.with_tile(coord, |tile| tile.get_pixel(lx, ly))
    }

    /// Unfill a whole tile, returning whether anything changed
    pub fn clear_tile(&self, coord: TileCoord) -> bool {
        let mut guard = self.resident(coord);
        let state = &mut *guard;
        let changed = state.tiles.get_mut(&coord).is_some_and(Tile::clear);
        if changed {
            state.modified.insert(coord);
        }
        changed
    }

    /// Displayable raster of a tile.
    ///
    /// A tile that is neither resident nor stored gets the shared blank raster
    /// without entering the cache.
    pub fn raster(&self, coord: TileCoord) -> RasterHandle {
        if !self.is_resident(coord) && !self.tile_exists(coord) {
            return blank_raster();
        }
        let mut guard = self.resident(coord);
        guard
            .tiles
            .get_mut(&coord)
            .map_or_else(blank_raster, Tile::raster)
    }

    /// Rasters for every tile overlapping a viewport, in row-major order
    pub fn rasters_in(&self, viewport: CanvasRect) -> Vec<(TileCoord, RasterHandle)> {
        let Some(range) = TileRange::covering(viewport) else {
            return Vec::new();
        };
        range.iter().map(|coord| (coord, self.raster(coord))).collect()
    }

    /// Whether persistence holds a blob for the tile, regardless of the cache
    pub fn tile_exists(&self, coord: TileCoord) -> bool {
        self.backend.exists(&TileKey::new(coord))
    }

    pub fn is_resident(&self, coord: TileCoord) -> bool {
        self.lock().tiles.contains_key(&coord)
    }

    pub fn resident_count(&self) -> usize {
        self.lock().tiles.len()
    }

    /// Whether the tile changed since it was last flushed
    pub fn is_modified(&self, coord: TileCoord) -> bool {
        self.lock().modified.contains(&coord)
    }

    pub fn modified_count(&self) -> usize {
        self.lock().modified.len()
    }

    /// Modified tiles in row-major order
    pub fn modified_tiles(&self) -> Vec<TileCoord> {
        let mut coords: Vec<_> = self.lock().modified.iter().copied().collect();
        sort_row_major(&mut coords);
        coords
    }

    /// Drop resident tiles that have nothing left to persist.
    ///
    /// Returns how many were unloaded. Modified tiles stay resident.
    pub fn unload_clean(&self) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let before = state.tiles.len();
        let modified = &state.modified;
        state.tiles.retain(|coord, _| modified.contains(coord));
        let unloaded = before - state.tiles.len();
        debug!("Unloaded {} clean tiles ({} resident)", unloaded, state.tiles.len());
        unloaded
    }

    /// Serialize every modified tile under the lock
    fn snapshot_modified(&self) -> Vec<Snapshot> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut stray = Vec::new();
        let mut snapshots = Vec::with_capacity(state.modified.len());

        for &coord in &state.modified {
            match state.tiles.get(&coord) {
                Some(tile) => snapshots.push(Snapshot {
                    coord,
                    revision: tile.revision(),
                    bytes: tile.serialize(),
                }),
                None => stray.push(coord),
            }
        }

        if !stray.is_empty() {
            debug_assert!(stray.is_empty(), "modified tiles missing from cache: {stray:?}");
            error!("Modified set references {} tiles not in cache: {:?}", stray.len(), stray);
            for coord in &stray {
                state.modified.remove(coord);
            }
        }

        snapshots.sort_by_key(|s| (s.coord.y, s.coord.x));
        snapshots
    }

    /// Persist every modified tile.
    ///
    /// Writes happen without holding the cache lock. A failed write does not
    /// stop the others and leaves its tile modified. A tile that changed again
    /// while its write was in flight also stays modified. Flushing with nothing
    /// modified performs no writes.
    ///
    /// Concurrent flushes run one after another, so an older snapshot can never
    /// land on top of a newer one.
    pub fn flush(&self) -> FlushReport {
        let _flushing = self.flushing.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshots = self.snapshot_modified();
        if snapshots.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport::default();
        let mut persisted = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let key = TileKey::new(snapshot.coord);
            match self.backend.write(&key, &snapshot.bytes) {
                Ok(()) => persisted.push((snapshot.coord, snapshot.revision)),
                Err(error) => {
                    warn!("Failed to persist tile {}: {}", key, error);
                    report.failed.push(FlushFailure {
                        coord: snapshot.coord,
                        error,
                    });
                }
            }
        }

        {
            let mut guard = self.lock();
            let state = &mut *guard;
            for &(coord, revision) in &persisted {
                let unchanged = state
                    .tiles
                    .get(&coord)
                    .is_some_and(|tile| tile.revision() == revision);
                if unchanged {
                    state.modified.remove(&coord);
                }
            }
        }

        report.written = persisted.into_iter().map(|(coord, _)| coord).collect();
        info!(
            "Flushed {} tiles ({} failed)",
            report.written.len(),
            report.failed.len()
        );
        report
    }
}

impl<B: TileBackend> std::fmt::Debug for TileStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TileStore")
            .field("resident", &state.tiles.len())
            .field("modified", &state.modified.len())
            .finish()
    }
}

fn sort_row_major(coords: &mut [TileCoord]) {
    coords.sort_by_key(|c| (c.y, c.x));
}
