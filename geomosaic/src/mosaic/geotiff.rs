//! GeoTIFF codec built on the `tiff` crate.
//!
//! Reads rasters georeferenced either by tie point + pixel scale or by a
//! (non-rotated) model transformation matrix. Writes tie point + pixel
//! scale and a GeoKey directory carrying the EPSG code.
//!
//! Supported layouts: 1, 3 or 4 interleaved bands of u8, u16 or f32.

use super::codec::{RasterCodec, RasterReader, RasterWriter};
use super::raster::{Crs, DataType, PixelBuffer, PixelData, RasterError, RasterInfo};
use crate::fetch::GEOTIFF_FORMAT;
use crate::geo::BoundingBox;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

// GeoKey identifiers
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

// TIFF SampleFormat values
const SAMPLE_FORMAT_UINT: u32 = 1;
const SAMPLE_FORMAT_IEEEFP: u32 = 3;

/// Reads and writes GeoTIFF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffCodec;

impl GeoTiffCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RasterCodec for GeoTiffCodec {
    type Reader = GeoTiffReader;
    type Writer = GeoTiffWriter;

    fn open(&self, path: &Path) -> Result<GeoTiffReader, RasterError> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let (bands, bits) = layout(decoder.colortype()?)?;
        let sample_format = decoder
            .find_tag(Tag::SampleFormat)?
            .map(|v| v.into_u32_vec())
            .transpose()?
            .and_then(|v| v.first().copied())
            .unwrap_or(SAMPLE_FORMAT_UINT);

        let data_type = match (bits, sample_format) {
            (8, SAMPLE_FORMAT_UINT) => DataType::U8,
            (16, SAMPLE_FORMAT_UINT) => DataType::U16,
            (32, SAMPLE_FORMAT_IEEEFP) => DataType::F32,
            _ => {
                return Err(RasterError::Unsupported(format!(
                    "{}-bit samples with sample format {}",
                    bits, sample_format
                )))
            }
        };

        let bounds = read_bounds(&mut decoder, width, height, path)?;
        let crs = read_crs(&mut decoder, path)?;

        Ok(GeoTiffReader {
            decoder,
            info: RasterInfo {
                width,
                height,
                bands,
                data_type,
                crs,
                bounds,
            },
        })
    }

    fn create(&self, path: &Path, info: &RasterInfo) -> Result<GeoTiffWriter, RasterError> {
        if !matches!(info.bands, 1 | 3 | 4) {
            return Err(RasterError::Unsupported(format!("{} bands", info.bands)));
        }
        let file = BufWriter::new(File::create(path)?);
        Ok(GeoTiffWriter {
            path: path.to_path_buf(),
            file,
            info: *info,
            pixels: PixelBuffer::zeroed(info.width, info.height, info.bands, info.data_type),
        })
    }

    fn format(&self) -> &str {
        GEOTIFF_FORMAT
    }
}

/// Returns (bands, bits per sample).
fn layout(color: ColorType) -> Result<(u16, u8), RasterError> {
    match color {
        ColorType::Gray(bits) => Ok((1, bits)),
        ColorType::RGB(bits) => Ok((3, bits)),
        ColorType::RGBA(bits) => Ok((4, bits)),
        other => Err(RasterError::Unsupported(format!("{:?}", other))),
    }
}

fn f64_tag<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>, RasterError> {
    Ok(decoder.find_tag(tag)?.map(|v| v.into_f64_vec()).transpose()?)
}

fn read_bounds<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
    path: &Path,
) -> Result<BoundingBox, RasterError> {
    let (w, h) = (width as f64, height as f64);

    let scale = f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tie = f64_tag(decoder, Tag::ModelTiepointTag)?;
    if let (Some(scale), Some(tie)) = (scale, tie) {
        if scale.len() >= 2 && tie.len() >= 6 {
            let (sx, sy) = (scale[0], scale[1]);
            let left = tie[3] - tie[0] * sx;
            let top = tie[4] + tie[1] * sy;
            return Ok(BoundingBox::from_extent(left, top - h * sy, left + w * sx, top)?);
        }
    }

    if let Some(m) = f64_tag(decoder, Tag::ModelTransformationTag)? {
        if m.len() >= 16 {
            if m[1] != 0.0 || m[4] != 0.0 {
                return Err(RasterError::Unsupported(
                    "rotated model transformation".to_string(),
                ));
            }
            let (sx, sy) = (m[0], -m[5]);
            let (left, top) = (m[3], m[7]);
            return Ok(BoundingBox::from_extent(left, top - h * sy, left + w * sx, top)?);
        }
    }

    Err(RasterError::MissingGeoreference(path.to_path_buf()))
}

fn read_crs<R: std::io::Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Crs, RasterError> {
    let keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(value) => value.into_u32_vec()?,
        None => {
            debug!(path = %path.display(), "No GeoKey directory, assuming EPSG:4326");
            return Ok(Crs::WGS84);
        }
    };

    // Header is 4 shorts, then (key, location, count, value) entries
    for entry in keys.get(4..).unwrap_or_default().chunks_exact(4) {
        let (key, location, value) = (entry[0] as u16, entry[1], entry[3] as u16);
        if location != 0 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => return Ok(Crs::Projected(value)),
            GEOGRAPHIC_TYPE => return Ok(Crs::Geographic(value)),
            _ => {}
        }
    }

    debug!(path = %path.display(), "GeoKey directory has no EPSG code, assuming EPSG:4326");
    Ok(Crs::WGS84)
}

/// Open GeoTIFF file.
pub struct GeoTiffReader {
    decoder: Decoder<BufReader<File>>,
    info: RasterInfo,
}

impl RasterReader for GeoTiffReader {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_pixels(&mut self) -> Result<PixelBuffer, RasterError> {
        let data = match self.decoder.read_image()? {
            DecodingResult::U8(v) => PixelData::U8(v),
            DecodingResult::U16(v) => PixelData::U16(v),
            DecodingResult::F32(v) => PixelData::F32(v),
            _ => {
                return Err(RasterError::Unsupported(format!(
                    "decoded sample type for {}",
                    self.info.data_type
                )))
            }
        };
        PixelBuffer::new(self.info.width, self.info.height, self.info.bands, data)
    }
}

/// GeoTIFF under construction. Pixels are held in memory until
/// [`finish`](RasterWriter::finish).
pub struct GeoTiffWriter {
    path: PathBuf,
    file: BufWriter<File>,
    info: RasterInfo,
    pixels: PixelBuffer,
}

impl GeoTiffWriter {
    pub fn info(&self) -> &RasterInfo {
        &self.info
    }
}

fn pixel_scale(info: &RasterInfo) -> [f64; 3] {
    [info.pixel_width(), info.pixel_height(), 0.0]
}

fn tie_point(info: &RasterInfo) -> [f64; 6] {
    [0.0, 0.0, 0.0, info.bounds.min_lon(), info.bounds.max_lat(), 0.0]
}

#[rustfmt::skip]
fn geo_keys(crs: Crs) -> [u16; 16] {
    let (model, crs_key) = match crs {
        Crs::Geographic(_) => (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE),
        Crs::Projected(_) => (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE),
    };
    [
        1, 1, 0, 3,
        GT_MODEL_TYPE, 0, 1, model,
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, crs.epsg(),
    ]
}

fn encode<W, C>(
    encoder: &mut TiffEncoder<W>,
    info: &RasterInfo,
    data: &[C::Inner],
) -> Result<(), RasterError>
where
    W: Write + Seek,
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(info.width, info.height)?;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &pixel_scale(info)[..])?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tie_point(info)[..])?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geo_keys(info.crs)[..])?;
    image.write_data(data)?;
    Ok(())
}

impl RasterWriter for GeoTiffWriter {
    fn write_region(&mut self, x: u32, y: u32, pixels: &PixelBuffer) -> Result<(), RasterError> {
        let mismatch = RasterError::LayoutMismatch {
            expected: self.info.data_type,
            expected_bands: self.info.bands,
            actual: pixels.data.data_type(),
            actual_bands: pixels.bands,
        };
        if pixels.bands != self.info.bands {
            return Err(mismatch);
        }
        if x as u64 + pixels.width as u64 > self.info.width as u64
            || y as u64 + pixels.height as u64 > self.info.height as u64
        {
            return Err(RasterError::RegionOutOfBounds {
                x,
                y,
                width: pixels.width,
                height: pixels.height,
            });
        }

        let dst_width = self.info.width;
        let bands = self.info.bands as usize;
        match (&mut self.pixels.data, &pixels.data) {
            (PixelData::U8(dst), PixelData::U8(src)) => blit(dst, dst_width, src, pixels, bands, x, y),
            (PixelData::U16(dst), PixelData::U16(src)) => blit(dst, dst_width, src, pixels, bands, x, y),
            (PixelData::F32(dst), PixelData::F32(src)) => blit(dst, dst_width, src, pixels, bands, x, y),
            _ => return Err(mismatch),
        }
        Ok(())
    }

    fn finish(self) -> Result<(), RasterError> {
        let GeoTiffWriter {
            path,
            mut file,
            info,
            pixels,
        } = self;

        {
            let mut encoder = TiffEncoder::new(&mut file)?;
            let enc = &mut encoder;
            match (info.bands, &pixels.data) {
                (1, PixelData::U8(v)) => encode::<_, colortype::Gray8>(enc, &info, v)?,
                (3, PixelData::U8(v)) => encode::<_, colortype::RGB8>(enc, &info, v)?,
                (4, PixelData::U8(v)) => encode::<_, colortype::RGBA8>(enc, &info, v)?,
                (1, PixelData::U16(v)) => encode::<_, colortype::Gray16>(enc, &info, v)?,
                (3, PixelData::U16(v)) => encode::<_, colortype::RGB16>(enc, &info, v)?,
                (4, PixelData::U16(v)) => encode::<_, colortype::RGBA16>(enc, &info, v)?,
                (1, PixelData::F32(v)) => encode::<_, colortype::Gray32Float>(enc, &info, v)?,
                (3, PixelData::F32(v)) => encode::<_, colortype::RGB32Float>(enc, &info, v)?,
                (4, PixelData::F32(v)) => encode::<_, colortype::RGBA32Float>(enc, &info, v)?,
                (bands, _) => return Err(RasterError::Unsupported(format!("{} bands", bands))),
            }
        }
        file.flush()?;

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            bands = info.bands,
            "GeoTIFF written"
        );
        Ok(())
    }
}

/// Copies `src` into `dst` (row stride `dst_width`) at column `x`, row `y`.
fn blit<T: Copy>(
    dst: &mut [T],
    dst_width: u32,
    src: &[T],
    region: &PixelBuffer,
    bands: usize,
    x: u32,
    y: u32,
) {
    let src_stride = region.width as usize * bands;
    let dst_stride = dst_width as usize * bands;
    for row in 0..region.height as usize {
        let src_start = row * src_stride;
        let dst_start = (y as usize + row) * dst_stride + x as usize * bands;
        dst[dst_start..dst_start + src_stride].copy_from_slice(&src[src_start..src_start + src_stride]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(bands: u16, data_type: DataType, crs: Crs) -> RasterInfo {
        RasterInfo {
            width: 4,
            height: 2,
            bands,
            data_type,
            crs,
            bounds: BoundingBox::new(10.0, 40.0, 12.0, 41.0).unwrap(),
        }
    }

    #[test]
    fn test_write_then_open_preserves_georeference() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.tif");
        let codec = GeoTiffCodec::new();

        let mut writer = codec.create(&path, &info(3, DataType::U16, Crs::WGS84)).unwrap();
        let region = PixelBuffer::new(1, 1, 3, PixelData::U16(vec![100, 200, 300])).unwrap();
        writer.write_region(2, 1, &region).unwrap();
        writer.finish().unwrap();

        let mut reader = codec.open(&path).unwrap();
        let read_info = *reader.info();
        assert_eq!(read_info.width, 4);
        assert_eq!(read_info.height, 2);
        assert_eq!(read_info.bands, 3);
        assert_eq!(read_info.data_type, DataType::U16);
        assert_eq!(read_info.crs, Crs::WGS84);
        assert!(read_info
            .bounds
            .approx_eq(&BoundingBox::new(10.0, 40.0, 12.0, 41.0).unwrap(), 1e-9));

        let pixels = reader.read_pixels().unwrap();
        let PixelData::U16(samples) = pixels.data else {
            panic!("expected u16 samples");
        };
        // Row 1, column 2
        let offset = (4 + 2) * 3;
        assert_eq!(&samples[offset..offset + 3], &[100, 200, 300]);
        assert_eq!(samples.iter().filter(|&&s| s != 0).count(), 3);
    }

    #[test]
    fn test_projected_crs_and_float_samples() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("utm.tif");
        let codec = GeoTiffCodec::new();
        let mut spec = info(1, DataType::F32, Crs::Projected(32633));
        spec.bounds = BoundingBox::from_extent(500_000.0, 4_000_000.0, 500_120.0, 4_000_060.0).unwrap();

        let writer = codec.create(&path, &spec).unwrap();
        writer.finish().unwrap();

        let reader = codec.open(&path).unwrap();
        assert_eq!(reader.info().crs, Crs::Projected(32633));
        assert_eq!(reader.info().data_type, DataType::F32);
        assert!((reader.info().pixel_width() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_reads_model_transformation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("matrix.tif");
        {
            let mut file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(&mut file).unwrap();
            let mut image = encoder.new_image::<colortype::Gray8>(2, 2).unwrap();
            #[rustfmt::skip]
            let matrix: [f64; 16] = [
                0.5, 0.0, 0.0, -5.0,
                0.0, -0.25, 0.0, 3.0,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            image
                .encoder()
                .write_tag(Tag::ModelTransformationTag, &matrix[..])
                .unwrap();
            image.write_data(&[1u8, 2, 3, 4]).unwrap();
        }

        let reader = GeoTiffCodec.open(&path).unwrap();
        let bounds = reader.info().bounds;
        assert!(bounds.approx_eq(&BoundingBox::new(-5.0, 2.5, -4.0, 3.0).unwrap(), 1e-12));
        assert_eq!(reader.info().crs, Crs::WGS84);
    }

    #[test]
    fn test_plain_tiff_has_no_georeference() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plain.tif");
        {
            let mut file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(&mut file).unwrap();
            encoder
                .write_image::<colortype::Gray8>(1, 1, &[0u8])
                .unwrap();
        }

        let result = GeoTiffCodec.open(&path);
        assert!(matches!(result, Err(RasterError::MissingGeoreference(_))));
    }

    #[test]
    fn test_region_checks() {
        let temp = TempDir::new().unwrap();
        let codec = GeoTiffCodec::new();
        let mut writer = codec
            .create(&temp.path().join("r.tif"), &info(1, DataType::U8, Crs::WGS84))
            .unwrap();

        let too_wide = PixelBuffer::zeroed(3, 1, 1, DataType::U8);
        assert!(matches!(
            writer.write_region(2, 0, &too_wide),
            Err(RasterError::RegionOutOfBounds { .. })
        ));

        let wrong_type = PixelBuffer::zeroed(1, 1, 1, DataType::U16);
        assert!(matches!(
            writer.write_region(0, 0, &wrong_type),
            Err(RasterError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn test_two_band_output_rejected() {
        let temp = TempDir::new().unwrap();
        let result = GeoTiffCodec.create(
            &temp.path().join("x.tif"),
            &info(2, DataType::U8, Crs::WGS84),
        );
        assert!(matches!(result, Err(RasterError::Unsupported(_))));
    }

    #[test]
    fn test_layout_accepts_gray_rgb_rgba_only() {
        assert_eq!(layout(ColorType::Gray(8)).unwrap(), (1, 8));
        assert_eq!(layout(ColorType::RGB(16)).unwrap(), (3, 16));
        assert_eq!(layout(ColorType::RGBA(8)).unwrap(), (4, 8));
        assert!(matches!(
            layout(ColorType::GrayA(8)),
            Err(RasterError::Unsupported(_))
        ));
        assert!(matches!(
            layout(ColorType::CMYK(8)),
            Err(RasterError::Unsupported(_))
        ));
    }
}
