//! Square brush stamps
//!
//! A stamp fills (or, in erase mode, unfills) a `size x size` block of canvas
//! pixels whose top-left corner is the stamp point. Pixels are routed through
//! the [`TileStore`] one at a time, so a stamp straddling a tile edge lands in
//! every tile it touches.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::constants::DEFAULT_BRUSH_SIZE;
use crate::storage::TileBackend;
use crate::store::TileStore;

/// Whether a stroke fills or unfills pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum StrokeMode {
    #[default]
    Draw = 0,
    Erase = 1,
}

impl StrokeMode {
    /// Pixel value this mode writes
    #[inline]
    pub fn fills(self) -> bool {
        matches!(self, StrokeMode::Draw)
    }
}

/// Brush configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brush {
    /// Edge length of the square stamp in pixels, at least 1
    pub size: u32,
    pub mode: StrokeMode,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            size: DEFAULT_BRUSH_SIZE,
            mode: StrokeMode::Draw,
        }
    }
}

impl Brush {
    pub fn new(size: u32, mode: StrokeMode) -> Self {
        Self {
            size: size.max(1),
            mode,
        }
    }

    /// Brush of the given size that unfills pixels
    pub fn eraser(size: u32) -> Self {
        Self::new(size, StrokeMode::Erase)
    }

    /// Canvas pixels covered by a stamp at `(x, y)`, row by row.
    ///
    /// Pixels past the edge of the `i32` canvas are dropped.
    pub fn footprint(&self, x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> {
        let size = self.size.max(1);
        (0..size)
            .filter_map(move |dy| y.checked_add_unsigned(dy))
            .flat_map(move |py| {
                (0..size)
                    .filter_map(move |dx| x.checked_add_unsigned(dx))
                    .map(move |px| (px, py))
            })
    }
}

/// Apply one stamp, returning how many pixels changed
pub fn stamp<B: TileBackend>(store: &TileStore<B>, x: i32, y: i32, brush: &Brush) -> usize {
    let filled = brush.mode.fills();
    let changed = brush
        .footprint(x, y)
        .map(|(px, py)| store.set_canvas_pixel(px, py, filled))
        .filter(|&changed| changed)
        .count();
    trace!("stamp at ({}, {}) size {} -> {} changed", x, y, brush.size, changed);
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::TileCoord;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_default_brush() {
        let brush = Brush::default();
        assert_eq!(brush.size, 2);
        assert_eq!(brush.mode, StrokeMode::Draw);
        assert_eq!(Brush::new(0, StrokeMode::Draw).size, 1);
    }

    #[test]
    fn test_footprint() {
        let pixels: Vec<_> = Brush::default().footprint(-1, 4).collect();
        assert_eq!(pixels, vec![(-1, 4), (0, 4), (-1, 5), (0, 5)]);
    }

    #[test]
    fn test_footprint_clipped_at_canvas_edge() {
        let pixels: Vec<_> = Brush::new(3, StrokeMode::Draw)
            .footprint(i32::MAX, i32::MAX - 1)
            .collect();
        assert_eq!(pixels, vec![(i32::MAX, i32::MAX - 1), (i32::MAX, i32::MAX)]);
    }

    #[test]
    fn test_stamp_across_four_tiles() {
        let store = TileStore::new(MemoryBackend::new());
        assert_eq!(stamp(&store, 255, 255, &Brush::default()), 4);

        assert!(store.with_tile(TileCoord::new(0, 0), |t| t.get_pixel(255, 255)));
        assert!(store.with_tile(TileCoord::new(1, 0), |t| t.get_pixel(0, 255)));
        assert!(store.with_tile(TileCoord::new(0, 1), |t| t.get_pixel(255, 0)));
        assert!(store.with_tile(TileCoord::new(1, 1), |t| t.get_pixel(0, 0)));
        assert_eq!(store.modified_count(), 4);

        // Restamping changes nothing
        assert_eq!(stamp(&store, 255, 255, &Brush::default()), 0);
    }

    #[test]
    fn test_erase_stamp() {
        let store = TileStore::new(MemoryBackend::new());
        stamp(&store, 10, 10, &Brush::new(3, StrokeMode::Draw));
        assert_eq!(stamp(&store, 10, 10, &Brush::eraser(2)), 4);
        assert!(!store.canvas_pixel(10, 10));
        assert!(store.canvas_pixel(12, 12));
    }
}
