//! Area-of-interest tiling
//!
//! Splits a [`BoundingBox`] into a grid of [`Tile`]s small enough for a
//! single provider request. Two policies are supported:
//!
//! - [`TilingMethod::Degree`]: fixed angular tile size, last row/column
//!   clipped to the area edge
//! - [`TilingMethod::PixelGrid`]: a target tile count with near-square cells
//!
//! Tiling is pure and deterministic. It never returns an empty vector: when
//! the parameters cannot produce a grid, a single tile covering the whole
//! area is returned and a warning is logged.

mod grid;

pub use grid::{compute_tiles, Tile, TilingMethod};
