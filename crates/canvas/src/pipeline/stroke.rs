//! Stroke handling for the canvas

use tracing::{debug, info};

use crate::brush::stamp;
use crate::storage::TileBackend;
use crate::store::FlushReport;

use super::{rasterize_segment, to_canvas_pixel, Canvas, StrokeSession};

impl<B: TileBackend> Canvas<B> {
    /// Begin a stroke at a canvas-space position.
    ///
    /// Nothing is drawn yet; the first `stroke_to` draws from here. A stroke
    /// already in progress is abandoned without flushing.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        let start = (to_canvas_pixel(x), to_canvas_pixel(y));
        if let Some(previous) = self.stroke.take() {
            debug!(
                "begin_stroke: replacing unfinished stroke ({} pixels changed)",
                previous.changed
            );
        }
        self.stroke = Some(StrokeSession {
            last: start,
            changed: 0,
        });
    }

    /// Continue the stroke to a new canvas-space position.
    ///
    /// Rasterizes the segment from the previous point and returns how many
    /// pixels changed. Ignored when no stroke is active.
    pub fn stroke_to(&mut self, x: f32, y: f32) -> usize {
        let Some(session) = self.stroke.as_mut() else {
            debug!("stroke_to: no active stroke, ignoring");
            return 0;
        };
        let to = (to_canvas_pixel(x), to_canvas_pixel(y));
        let changed = rasterize_segment(&*self.store, session.last, to, &self.brush);
        session.last = to;
        session.changed += changed;
        changed
    }

    /// Stamp the brush once at the stroke's current point (a tap)
    pub fn dot(&mut self) -> usize {
        let Some(session) = self.stroke.as_mut() else {
            debug!("dot: no active stroke, ignoring");
            return 0;
        };
        let (x, y) = session.last;
        let changed = stamp(&*self.store, x, y, &self.brush);
        session.changed += changed;
        changed
    }

    /// End the current stroke.
    ///
    /// Returns the flush report when the canvas flushes on stroke end,
    /// `None` otherwise or when no stroke was active.
    pub fn end_stroke(&mut self) -> Option<FlushReport> {
        let session = self.stroke.take()?;
        debug!("end_stroke: {} pixels changed", session.changed);
        if !self.flush_on_stroke_end {
            return None;
        }
        let report = self.store.flush();
        if !report.is_complete() {
            info!(
                "{} tiles failed to persist; they stay pending for the next flush",
                report.failed.len()
            );
        }
        Some(report)
    }

    /// Stop the current stroke without flushing.
    ///
    /// Pixels already drawn stay drawn and remain pending for the next flush.
    pub fn cancel_stroke(&mut self) {
        if let Some(session) = self.stroke.take() {
            debug!("cancel_stroke: {} pixels changed", session.changed);
        }
    }

    /// Check if a stroke is currently in progress
    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }
}
