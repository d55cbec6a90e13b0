//! Raster value types shared by codecs and the merger.

use crate::geo::{BoundingBox, GeoError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Sample type of every band in a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    U16,
    F32,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::U8 => write!(f, "u8"),
            DataType::U16 => write!(f, "u16"),
            DataType::F32 => write!(f, "f32"),
        }
    }
}

/// Coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Geographic (lat/lon) system, e.g. EPSG:4326
    Geographic(u16),
    /// Projected system, e.g. a UTM zone
    Projected(u16),
}

impl Crs {
    pub const WGS84: Crs = Crs::Geographic(4326);

    pub fn epsg(&self) -> u16 {
        match self {
            Crs::Geographic(code) | Crs::Projected(code) => *code,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Band-interleaved pixel samples.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelData {
    /// Zero-filled samples of the given type.
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U8 => PixelData::U8(vec![0; len]),
            DataType::U16 => PixelData::U16(vec![0; len]),
            DataType::F32 => PixelData::F32(vec![0.0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            PixelData::U8(_) => DataType::U8,
            PixelData::U16(_) => DataType::U16,
            PixelData::F32(_) => DataType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::U16(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A rectangular block of pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub bands: u16,
    /// `width * height * bands` samples, row-major, bands interleaved
    pub data: PixelData,
}

impl PixelBuffer {
    /// Wraps `data`, checking its length against the dimensions.
    pub fn new(width: u32, height: u32, bands: u16, data: PixelData) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * bands as usize;
        if data.len() != expected {
            return Err(RasterError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bands,
            data,
        })
    }

    pub fn zeroed(width: u32, height: u32, bands: u16, data_type: DataType) -> Self {
        let len = width as usize * height as usize * bands as usize;
        Self {
            width,
            height,
            bands,
            data: PixelData::zeroed(data_type, len),
        }
    }

    /// Nearest-neighbour resample.
    ///
    /// Output pixel `(row, col)` takes source pixel `(rows[row], cols[col])`.
    pub fn resample(&self, rows: &[u32], cols: &[u32]) -> PixelBuffer {
        let bands = self.bands as usize;
        let data = match &self.data {
            PixelData::U8(v) => PixelData::U8(pick(v, self.width, bands, rows, cols)),
            PixelData::U16(v) => PixelData::U16(pick(v, self.width, bands, rows, cols)),
            PixelData::F32(v) => PixelData::F32(pick(v, self.width, bands, rows, cols)),
        };
        PixelBuffer {
            width: cols.len() as u32,
            height: rows.len() as u32,
            bands: self.bands,
            data,
        }
    }
}

fn pick<T: Copy>(src: &[T], src_width: u32, bands: usize, rows: &[u32], cols: &[u32]) -> Vec<T> {
    let stride = src_width as usize * bands;
    let mut out = Vec::with_capacity(rows.len() * cols.len() * bands);
    for &row in rows {
        let line = &src[row as usize * stride..(row as usize + 1) * stride];
        for &col in cols {
            let start = col as usize * bands;
            out.extend_from_slice(&line[start..start + bands]);
        }
    }
    out
}

/// Shape and georeferencing of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterInfo {
    pub width: u32,
    pub height: u32,
    pub bands: u16,
    pub data_type: DataType,
    pub crs: Crs,
    /// Outer edges of the pixel grid in CRS units
    pub bounds: BoundingBox,
}

impl RasterInfo {
    /// Pixel width in CRS units.
    pub fn pixel_width(&self) -> f64 {
        self.bounds.width() / self.width as f64
    }

    /// Pixel height in CRS units (positive).
    pub fn pixel_height(&self) -> f64 {
        self.bounds.height() / self.height as f64
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Raster I/O errors.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("unsupported raster layout: {0}")]
    Unsupported(String),

    #[error("{0} has no georeferencing")]
    MissingGeoreference(PathBuf),

    #[error("invalid raster bounds: {0}")]
    InvalidBounds(#[from] GeoError),

    #[error("pixel buffer holds {actual} samples, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("region {width}x{height} at ({x}, {y}) exceeds raster")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("expected {expected} samples with {expected_bands} bands, got {actual} with {actual_bands}")]
    LayoutMismatch {
        expected: DataType,
        expected_bands: u16,
        actual: DataType,
        actual_bands: u16,
    },
}

impl From<tiff::TiffError> for RasterError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => RasterError::Io(e),
            other => RasterError::Tiff(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_length_checked() {
        let err = PixelBuffer::new(2, 2, 3, PixelData::U8(vec![0; 11])).unwrap_err();
        assert!(matches!(
            err,
            RasterError::SizeMismatch {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn test_resample_picks_nearest_source() {
        // 2x2, two bands: pixel (r, c) = [10r + c, 100]
        let src = PixelBuffer::new(
            2,
            2,
            2,
            PixelData::U16(vec![0, 100, 1, 100, 10, 100, 11, 100]),
        )
        .unwrap();

        let out = src.resample(&[0, 0, 1], &[1, 0]);

        assert_eq!(out.width, 2);
        assert_eq!(out.height, 3);
        assert_eq!(
            out.data,
            PixelData::U16(vec![1, 100, 0, 100, 1, 100, 0, 100, 11, 100, 10, 100])
        );
    }

    #[test]
    fn test_info_pixel_size() {
        let info = RasterInfo {
            width: 100,
            height: 50,
            bands: 1,
            data_type: DataType::F32,
            crs: Crs::WGS84,
            bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap(),
        };
        assert_eq!(info.pixel_width(), 0.01);
        assert_eq!(info.pixel_height(), 0.02);
        assert_eq!(info.pixel_count(), 5000);
    }

    #[test]
    fn test_crs_display() {
        assert_eq!(Crs::WGS84.to_string(), "EPSG:4326");
        assert_eq!(Crs::Projected(32633).epsg(), 32633);
    }
}
