//! Canvas pixel to tile coordinate mapping
//!
//! Canvas space is an unbounded signed pixel grid. Tiles partition it into
//! `TILE_SIZE` squares; tile `(0, 0)` covers pixels `0..TILE_SIZE` on both
//! axes and tile `(-1, -1)` the square just above-left of it. All mapping uses
//! floored division so negative coordinates land in the right tile.

use serde::{Deserialize, Serialize};

use crate::constants::TILE_SIZE;

/// Tile index along one axis for a canvas pixel coordinate.
#[inline]
pub fn tile_coord(p: i32) -> i32 {
    p.div_euclid(TILE_SIZE as i32)
}

/// Offset of a canvas pixel coordinate inside its tile, always in `[0, TILE_SIZE)`.
#[inline]
pub fn local_offset(p: i32) -> u32 {
    p.rem_euclid(TILE_SIZE as i32) as u32
}

/// Tile coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile owning the given canvas pixel
    #[inline]
    pub fn containing(px: i32, py: i32) -> Self {
        Self::new(tile_coord(px), tile_coord(py))
    }

    /// Canvas position of this tile's top-left pixel.
    ///
    /// Widened to `i64` because the extreme tiles start outside the `i32` range.
    #[inline]
    pub fn origin(self) -> (i64, i64) {
        (
            self.x as i64 * TILE_SIZE as i64,
            self.y as i64 * TILE_SIZE as i64,
        )
    }

    /// Canvas position of a local pixel in this tile
    #[inline]
    pub fn to_canvas(self, local_x: u32, local_y: u32) -> (i64, i64) {
        let (ox, oy) = self.origin();
        (ox + local_x as i64, oy + local_y as i64)
    }
}

/// Split a canvas pixel into its tile and in-tile offset
#[inline]
pub fn split(px: i32, py: i32) -> (TileCoord, u32, u32) {
    (TileCoord::containing(px, py), local_offset(px), local_offset(py))
}

/// Axis-aligned region of canvas space (e.g. the visible viewport)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanvasRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CanvasRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Last pixel covered on each axis, clamped to the canvas range
    fn last_pixel(&self) -> (i32, i32) {
        let last = |start: i32, extent: u32| {
            (start as i64 + extent as i64 - 1).clamp(i32::MIN as i64, i32::MAX as i64) as i32
        };
        (last(self.x, self.width), last(self.y, self.height))
    }
}

/// Inclusive rectangle of tile coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min: TileCoord,
    pub max: TileCoord,
}

impl TileRange {
    /// All tiles overlapping the given region, or `None` for an empty region
    pub fn covering(rect: CanvasRect) -> Option<Self> {
        if rect.is_empty() {
            return None;
        }
        let (last_x, last_y) = rect.last_pixel();
        Some(Self {
            min: TileCoord::containing(rect.x, rect.y),
            max: TileCoord::containing(last_x, last_y),
        })
    }

    /// Number of tiles in the range, at least one
    pub fn tile_count(&self) -> usize {
        let w = (self.max.x as i64 - self.min.x as i64 + 1) as usize;
        let h = (self.max.y as i64 - self.min.y as i64 + 1) as usize;
        w * h
    }

    #[inline]
    pub fn contains(&self, coord: TileCoord) -> bool {
        (self.min.x..=self.max.x).contains(&coord.x) && (self.min.y..=self.max.y).contains(&coord.y)
    }

    /// Tiles in row-major order
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| TileCoord::new(x, y)))
    }
}
