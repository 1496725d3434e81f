//! A single fixed-size tile of the canvas
//!
//! The bit grid is kept in the persisted blob layout (row-major, one bit per
//! pixel, most significant bit first), so serialization is a plain copy.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::{ROW_BYTES, TILE_BYTES, TILE_SIZE};
use crate::coords::TileCoord;
use crate::error::TileError;
use crate::raster::{render_tile, RasterHandle};

/// Location of one pixel inside the packed grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPos {
    pub byte: usize,
    pub mask: u8,
}

/// Map local pixel coordinates to their byte and bit in the packed grid.
///
/// Returns `None` outside `[0, TILE_SIZE)`.
#[inline]
pub fn bit_position(x: u32, y: u32) -> Option<BitPos> {
    if x >= TILE_SIZE || y >= TILE_SIZE {
        return None;
    }
    let x = x as usize;
    Some(BitPos {
        byte: y as usize * ROW_BYTES + x / 8,
        mask: 0x80 >> (x % 8),
    })
}

/// Cached raster state
#[derive(Clone)]
enum RasterCache {
    Dirty,
    Clean(RasterHandle),
}

/// One `TILE_SIZE x TILE_SIZE` monochrome block of the canvas
#[derive(Clone)]
pub struct Tile {
    coord: TileCoord,
    bits: Box<[u8; TILE_BYTES]>,
    raster: RasterCache,
    revision: u64,
}

impl Tile {
    /// Create an all-unfilled tile
    pub fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            bits: Box::new([0u8; TILE_BYTES]),
            raster: RasterCache::Dirty,
            revision: 0,
        }
    }

    /// Decode a persisted blob. The blob must be exactly [`TILE_BYTES`] long.
    pub fn try_deserialize(coord: TileCoord, bytes: &[u8]) -> Result<Self, TileError> {
        let bits: [u8; TILE_BYTES] = bytes.try_into().map_err(|_| TileError::InvalidLength {
            expected: TILE_BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self {
            coord,
            bits: Box::new(bits),
            raster: RasterCache::Dirty,
            revision: 0,
        })
    }

    /// Decode a persisted blob, falling back to an empty tile when it is malformed
    pub fn deserialize(coord: TileCoord, bytes: &[u8]) -> Self {
        match Self::try_deserialize(coord, bytes) {
            Ok(tile) => tile,
            Err(err) => {
                warn!("Discarding stored tile ({}, {}): {}", coord.x, coord.y, err);
                Self::new(coord)
            }
        }
    }

    /// Packed blob for persistence
    pub fn serialize(&self) -> Vec<u8> {
        self.bits.to_vec()
    }

    #[inline]
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Change counter, bumped on every pixel that actually changes
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Read a local pixel. Out-of-range coordinates read as unfilled.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> bool {
        bit_position(x, y).is_some_and(|pos| self.bits[pos.byte] & pos.mask != 0)
    }

    /// Write a local pixel, returning whether its value changed.
    ///
    /// Out-of-range coordinates are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, filled: bool) -> bool {
        let Some(pos) = bit_position(x, y) else {
            return false;
        };
        let byte = &mut self.bits[pos.byte];
        let was_filled = *byte & pos.mask != 0;
        if was_filled == filled {
            return false;
        }
        if filled {
            *byte |= pos.mask;
        } else {
            *byte &= !pos.mask;
        }
        self.touch();
        true
    }

    /// Unfill every pixel, returning whether anything changed
    pub fn clear(&mut self) -> bool {
        if self.is_blank() {
            return false;
        }
        self.bits.fill(0);
        self.touch();
        true
    }

    /// Number of filled pixels
    pub fn filled_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True if no pixel is filled
    pub fn is_blank(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Whether the cached raster must be rebuilt before the next read
    #[inline]
    pub fn raster_dirty(&self) -> bool {
        matches!(self.raster, RasterCache::Dirty)
    }

    /// Current raster, rebuilt first if any pixel changed since the last call
    pub fn raster(&mut self) -> RasterHandle {
        if let RasterCache::Clean(handle) = &self.raster {
            return Arc::clone(handle);
        }
        debug!("Rebuilding raster for tile ({}, {})", self.coord.x, self.coord.y);
        let handle = Arc::new(render_tile(&self.bits));
        self.raster = RasterCache::Clean(Arc::clone(&handle));
        handle
    }

    fn touch(&mut self) {
        self.raster = RasterCache::Dirty;
        self.revision = self.revision.wrapping_add(1);
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.coord == other.coord && self.bits == other.bits
    }
}

impl Eq for Tile {}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("coord", &self.coord)
            .field("filled", &self.filled_count())
            .field("raster_dirty", &self.raster_dirty())
            .field("revision", &self.revision)
            .finish()
    }
}
