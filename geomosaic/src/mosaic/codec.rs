//! Raster codec abstraction.
//!
//! The merger only needs metadata, a full pixel read per input, and a
//! region-wise writer for the output. Any georeferenced format that can
//! provide those plugs in through [`RasterCodec`].

use super::raster::{PixelBuffer, RasterError, RasterInfo};
use std::path::Path;

/// Opens and creates raster files of one format.
pub trait RasterCodec: Send + Sync + 'static {
    type Reader: RasterReader;
    type Writer: RasterWriter;

    /// Opens `path` and reads its metadata.
    fn open(&self, path: &Path) -> Result<Self::Reader, RasterError>;

    /// Creates a zero-filled raster described by `info` at `path`.
    fn create(&self, path: &Path, info: &RasterInfo) -> Result<Self::Writer, RasterError>;

    /// Format name requested from imagery providers.
    fn format(&self) -> &str;
}

/// An open raster.
pub trait RasterReader {
    fn info(&self) -> &RasterInfo;

    /// Reads every pixel of every band.
    fn read_pixels(&mut self) -> Result<PixelBuffer, RasterError>;
}

/// A raster being written.
pub trait RasterWriter {
    /// Copies `pixels` into the raster with its top-left corner at
    /// column `x`, row `y`.
    fn write_region(&mut self, x: u32, y: u32, pixels: &PixelBuffer) -> Result<(), RasterError>;

    /// Flushes the raster to disk.
    fn finish(self) -> Result<(), RasterError>;
}
