//! voidfill canvas engine - sparse tiles over an unbounded monochrome raster
//!
//! This crate provides the storage and rasterization core:
//! - [`coords`] - Canvas pixel to tile coordinate mapping
//! - [`tile`] - Fixed-size bit grid with a lazily rebuilt raster
//! - [`raster`] - Displayable luma buffers derived from tiles
//! - [`storage`] - Byte-blob persistence backends
//! - [`store`] - Tile cache with modified-set tracking and batched flush
//! - [`brush`] - Square brush stamps in draw or erase mode
//! - [`pipeline`] - Bresenham stroke rasterizer and stroke sessions
//! - [`worker`] - Background flushing on the tokio blocking pool

pub mod brush;
pub mod constants;
pub mod coords;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod storage;
pub mod store;
pub mod tile;
pub mod worker;

pub use brush::*;
pub use constants::*;
pub use coords::*;
pub use error::*;
pub use pipeline::*;
pub use raster::*;
pub use storage::*;
pub use store::*;
pub use tile::*;
pub use worker::*;

pub use voidfill_config::CanvasConfig;
