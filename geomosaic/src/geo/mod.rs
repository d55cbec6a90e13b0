//! Geographic rectangle types
//!
//! Provides the validated [`BoundingBox`] used to describe the area of
//! interest, individual tiles, and raster extents.

mod types;

pub use types::{BoundingBox, GeoError, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
