//! Mosaic assembly.
//!
//! [`MosaicMerger`] stitches downloaded tiles into one georeferenced raster
//! through the [`RasterCodec`] abstraction; [`GeoTiffCodec`] is the
//! implementation used for provider downloads.
//!
//! # Example
//!
//! ```ignore
//! use geomosaic::mosaic::{GeoTiffCodec, MosaicMerger};
//!
//! let merger = MosaicMerger::new(GeoTiffCodec::new());
//! let summary = merger.merge(&tile_paths, Path::new("mosaic.tif"))?;
//! println!("{}x{} pixels", summary.width, summary.height);
//! ```

mod codec;
mod geotiff;
mod merger;
mod raster;

pub use codec::{RasterCodec, RasterReader, RasterWriter};
pub use geotiff::{GeoTiffCodec, GeoTiffReader, GeoTiffWriter};
pub use merger::{MergeError, MosaicMerger, MosaicSummary};
pub use raster::{Crs, DataType, PixelBuffer, PixelData, RasterError, RasterInfo};

#[cfg(test)]
mod tests;
