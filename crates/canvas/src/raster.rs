//! Displayable rasters derived from tile bit grids

use std::sync::{Arc, OnceLock};

use image::{GrayImage, Luma};

use crate::constants::{BACKGROUND_LUMA, FOREGROUND_LUMA, ROW_BYTES, TILE_BYTES, TILE_SIZE};

/// Shared, immutable raster of one tile.
///
/// Cloning is cheap; the rendering layer may hold a handle after the tile has
/// changed and simply sees the older frame.
pub type RasterHandle = Arc<GrayImage>;

/// Decode a packed bit grid (row-major, MSB-first) into an 8-bit luma image
pub fn render_tile(bits: &[u8; TILE_BYTES]) -> GrayImage {
    let mut raw = vec![BACKGROUND_LUMA; TILE_SIZE as usize * TILE_SIZE as usize];
    for (row, packed) in bits.chunks_exact(ROW_BYTES).enumerate() {
        let out = &mut raw[row * TILE_SIZE as usize..(row + 1) * TILE_SIZE as usize];
        for (byte_index, &byte) in packed.iter().enumerate() {
            if byte == 0 {
                continue;
            }
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    out[byte_index * 8 + bit] = FOREGROUND_LUMA;
                }
            }
        }
    }
    // Buffer length always matches the dimensions
    GrayImage::from_raw(TILE_SIZE, TILE_SIZE, raw)
        .unwrap_or_else(|| GrayImage::from_pixel(TILE_SIZE, TILE_SIZE, Luma([BACKGROUND_LUMA])))
}

/// Raster of a tile with nothing drawn on it, shared process-wide
pub fn blank_raster() -> RasterHandle {
    static BLANK: OnceLock<RasterHandle> = OnceLock::new();
    Arc::clone(
        BLANK.get_or_init(|| Arc::new(GrayImage::from_pixel(TILE_SIZE, TILE_SIZE, Luma([BACKGROUND_LUMA])))),
    )
}

/// Whether a raster pixel shows foreground
#[inline]
pub fn is_foreground(raster: &GrayImage, x: u32, y: u32) -> bool {
    raster.get_pixel(x, y).0[0] == FOREGROUND_LUMA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty() {
        let raster = render_tile(&[0u8; TILE_BYTES]);
        assert_eq!(raster.dimensions(), (TILE_SIZE, TILE_SIZE));
        assert!(raster.pixels().all(|p| p.0[0] == BACKGROUND_LUMA));
    }

    #[test]
    fn test_render_msb_first() {
        let mut bits = [0u8; TILE_BYTES];
        bits[0] = 0b1000_0001;
        // Second row, first pixel
        bits[ROW_BYTES] = 0b1000_0000;

        let raster = render_tile(&bits);
        assert!(is_foreground(&raster, 0, 0));
        assert!(!is_foreground(&raster, 1, 0));
        assert!(is_foreground(&raster, 7, 0));
        assert!(!is_foreground(&raster, 8, 0));
        assert!(is_foreground(&raster, 0, 1));
        assert_eq!(raster.pixels().filter(|p| p.0[0] == FOREGROUND_LUMA).count(), 3);
    }

    #[test]
    fn test_blank_raster_is_shared() {
        let a = blank_raster();
        let b = blank_raster();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!is_foreground(&a, 10, 10));
    }
}
