/// Edge length of a tile in pixels. Must stay a multiple of 8.
pub const TILE_SIZE: u32 = 256;

/// Bytes per packed tile row.
pub const ROW_BYTES: usize = TILE_SIZE as usize / 8;

/// Bytes per persisted tile blob (one bit per pixel).
pub const TILE_BYTES: usize = TILE_SIZE as usize * TILE_SIZE as usize / 8;

/// Default brush edge length (square stamp).
pub const DEFAULT_BRUSH_SIZE: u32 = voidfill_config::DEFAULT_BRUSH_SIZE;

/// Luma of a filled pixel in a tile raster.
pub const FOREGROUND_LUMA: u8 = 0;

/// Luma of an unfilled pixel in a tile raster.
pub const BACKGROUND_LUMA: u8 = 255;

const _: () = assert!(TILE_SIZE % 8 == 0);
