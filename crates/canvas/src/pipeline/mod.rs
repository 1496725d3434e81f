//! Stroke rasterization pipeline
//!
//! This module connects pointer input to tile writes:
//! - [`BresenhamLine`] interpolates between two canvas points
//! - [`rasterize_segment`] stamps the brush at every interpolated point
//! - [`Canvas`] tracks the active stroke and flushes when it ends
//!
//! Input arrives in canvas space; turning screen positions into canvas ones
//! (pan, zoom) is the host's job.

mod line;
mod stroke;

use std::sync::Arc;

use tracing::debug;
use voidfill_config::CanvasConfig;

use crate::brush::{stamp, Brush, StrokeMode};
use crate::coords::{CanvasRect, TileCoord};
use crate::raster::RasterHandle;
use crate::storage::{FileBackend, TileBackend};
use crate::store::{FlushReport, TileStore};

pub use line::BresenhamLine;

/// Truncate a canvas-space position to its pixel, toward zero.
///
/// Saturates at the `i32` range; NaN maps to 0.
#[inline]
pub fn to_canvas_pixel(v: f32) -> i32 {
    v as i32
}

/// Stamp the brush at every Bresenham point from `from` to `to`, inclusive.
///
/// Returns how many pixels changed. Coinciding endpoints produce one stamp.
pub fn rasterize_segment<B: TileBackend>(
    store: &TileStore<B>,
    from: (i32, i32),
    to: (i32, i32),
    brush: &Brush,
) -> usize {
    let changed: usize = BresenhamLine::new(from, to)
        .map(|(x, y)| stamp(store, x, y, brush))
        .sum();
    debug!(
        "rasterize_segment: {:?} -> {:?}, size={}, mode={:?} -> {} changed",
        from, to, brush.size, brush.mode, changed
    );
    changed
}

/// In-progress stroke state
#[derive(Debug, Clone, Copy)]
pub(crate) struct StrokeSession {
    /// Last rasterized canvas pixel
    pub(crate) last: (i32, i32),
    /// Pixels changed so far in this stroke
    pub(crate) changed: usize,
}

/// A drawing session over one tile store
///
/// Input comes in via `begin_stroke`, `stroke_to` and `end_stroke`. Each
/// `stroke_to` rasterizes the segment from the previous point; ending the
/// stroke persists the modified tiles when the session is configured to.
pub struct Canvas<B: TileBackend = FileBackend> {
    pub(crate) store: Arc<TileStore<B>>,
    pub(crate) brush: Brush,
    pub(crate) stroke: Option<StrokeSession>,
    pub(crate) flush_on_stroke_end: bool,
}

impl Canvas<FileBackend> {
    /// Open the canvas persisted under `config.tiles_dir`
    pub fn open(config: &CanvasConfig) -> Self {
        let config = config.clone().validated();
        debug!("Opening canvas at {}", config.tiles_dir.display());
        Self {
            store: Arc::new(TileStore::open(config.tiles_dir)),
            brush: Brush::new(config.brush_size, StrokeMode::Draw),
            stroke: None,
            flush_on_stroke_end: config.flush_on_stroke_end,
        }
    }
}

impl<B: TileBackend> Canvas<B> {
    /// Canvas over an existing store with the default brush
    pub fn with_store(store: Arc<TileStore<B>>) -> Self {
        Self {
            store,
            brush: Brush::default(),
            stroke: None,
            flush_on_stroke_end: true,
        }
    }

    /// Shared handle to the tile store, e.g. for a [`crate::worker::FlushWorker`]
    pub fn store(&self) -> &Arc<TileStore<B>> {
        &self.store
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    /// Takes effect from the next stamp, including mid-stroke
    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    pub fn set_mode(&mut self, mode: StrokeMode) {
        self.brush.mode = mode;
    }

    pub fn flush_on_stroke_end(&self) -> bool {
        self.flush_on_stroke_end
    }

    pub fn set_flush_on_stroke_end(&mut self, enabled: bool) {
        self.flush_on_stroke_end = enabled;
    }

    /// Persist all modified tiles now (e.g. when the host is paused)
    pub fn flush(&self) -> FlushReport {
        self.store.flush()
    }

    /// Tile rasters covering a viewport, for the rendering layer
    pub fn rasters_in(&self, viewport: CanvasRect) -> Vec<(TileCoord, RasterHandle)> {
        self.store.rasters_in(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TILE_SIZE;
    use crate::storage::MemoryBackend;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn memory_canvas() -> Canvas<MemoryBackend> {
        Canvas::with_store(Arc::new(TileStore::new(MemoryBackend::new())))
    }

    fn filled_columns(store: &TileStore<MemoryBackend>, coord: TileCoord, row: u32) -> Vec<u32> {
        store.with_tile(coord, |tile| (0..TILE_SIZE).filter(|&x| tile.get_pixel(x, row)).collect())
    }

    #[test]
    fn test_to_canvas_pixel_truncates() {
        assert_eq!(to_canvas_pixel(3.9), 3);
        assert_eq!(to_canvas_pixel(-3.9), -3);
        assert_eq!(to_canvas_pixel(f32::NAN), 0);
        assert_eq!(to_canvas_pixel(1e20), i32::MAX);
    }

    #[test]
    fn test_segment_single_stamp() {
        let store = TileStore::new(MemoryBackend::new());
        assert_eq!(rasterize_segment(&store, (7, 7), (7, 7), &Brush::default()), 4);
        assert!(store.canvas_pixel(7, 7));
        assert!(store.canvas_pixel(8, 8));
        assert!(!store.canvas_pixel(9, 7));
    }

    #[test]
    fn test_cross_tile_stroke() {
        let store = TileStore::new(MemoryBackend::new());
        rasterize_segment(&store, (254, 128), (260, 128), &Brush::default());

        assert_eq!(filled_columns(&store, TileCoord::new(0, 0), 128), vec![254, 255]);
        let right = filled_columns(&store, TileCoord::new(1, 0), 128);
        assert_eq!(right, vec![0, 1, 2, 3, 4, 5]);
        // Brush extends one row down
        assert_eq!(filled_columns(&store, TileCoord::new(1, 0), 129), right);
        assert!(filled_columns(&store, TileCoord::new(1, 0), 130).is_empty());

        assert!(store.is_modified(TileCoord::new(0, 0)));
        assert!(store.is_modified(TileCoord::new(1, 0)));
        assert_eq!(store.modified_count(), 2);
    }

    #[test]
    fn test_stroke_reproduces_bresenham_path() {
        let store = TileStore::new(MemoryBackend::new());
        let pen = Brush::new(1, StrokeMode::Draw);
        let (from, to) = ((-20, 13), (41, -9));
        rasterize_segment(&store, from, to, &pen);

        let expected: HashSet<_> = BresenhamLine::new(from, to).collect();
        for y in -12..=16 {
            for x in -25..=45 {
                assert_eq!(store.canvas_pixel(x, y), expected.contains(&(x, y)), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_fast_stroke_has_no_gaps() {
        let mut canvas = memory_canvas();
        canvas.set_brush(Brush::new(1, StrokeMode::Draw));
        canvas.begin_stroke(0.0, 0.0);
        canvas.stroke_to(100.0, 0.0);
        canvas.stroke_to(100.0, 60.0);
        canvas.end_stroke();

        let store = canvas.store();
        assert!((0..=100).all(|x| store.canvas_pixel(x, 0)));
        assert!((0..=60).all(|y| store.canvas_pixel(100, y)));
    }

    #[test]
    fn test_erase_segment() {
        let store = TileStore::new(MemoryBackend::new());
        rasterize_segment(&store, (0, 0), (10, 0), &Brush::default());
        rasterize_segment(&store, (3, 0), (5, 0), &Brush::eraser(2));
        assert!(store.canvas_pixel(2, 0));
        assert!(!store.canvas_pixel(3, 0));
        assert!(!store.canvas_pixel(6, 1));
        assert!(store.canvas_pixel(7, 0));
    }

    #[test]
    fn test_open_from_config() {
        let tmp_dir = TempDir::new().unwrap();
        let mut config = CanvasConfig::new(tmp_dir.path().join("tiles"));
        config.brush_size = 3;
        config.flush_on_stroke_end = false;

        let mut canvas = Canvas::open(&config);
        assert_eq!(canvas.brush().size, 3);
        assert!(!canvas.flush_on_stroke_end());

        canvas.begin_stroke(-5.0, -5.0);
        canvas.stroke_to(-5.0, -5.0);
        assert!(canvas.end_stroke().is_none());
        assert!(!canvas.store().tile_exists(TileCoord::new(-1, -1)));

        assert!(canvas.flush().is_complete());
        assert!(canvas.store().tile_exists(TileCoord::new(-1, -1)));

        let reopened = Canvas::open(&config);
        assert!(reopened.store().canvas_pixel(-3, -3));
        assert!(!reopened.store().canvas_pixel(-2, -2));
    }
}
