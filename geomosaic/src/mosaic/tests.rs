use super::*;
use crate::geo::BoundingBox;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a single-band u8 tile filled with `value`.
fn write_tile(path: &Path, bounds: (f64, f64, f64, f64), size: (u32, u32), value: u8) -> PathBuf {
    let info = RasterInfo {
        width: size.0,
        height: size.1,
        bands: 1,
        data_type: DataType::U8,
        crs: Crs::WGS84,
        bounds: BoundingBox::new(bounds.0, bounds.1, bounds.2, bounds.3).unwrap(),
    };
    let mut writer = GeoTiffCodec.create(path, &info).unwrap();
    let fill = PixelBuffer::new(
        size.0,
        size.1,
        1,
        PixelData::U8(vec![value; (size.0 * size.1) as usize]),
    )
    .unwrap();
    writer.write_region(0, 0, &fill).unwrap();
    writer.finish().unwrap();
    path.to_path_buf()
}

fn read_u8(path: &Path) -> (RasterInfo, Vec<u8>) {
    let mut reader = GeoTiffCodec.open(path).unwrap();
    let info = *reader.info();
    match reader.read_pixels().unwrap().data {
        PixelData::U8(v) => (info, v),
        other => panic!("expected u8 samples, got {:?}", other.data_type()),
    }
}

#[test]
fn test_disjoint_tiles_cover_union() {
    let temp = TempDir::new().unwrap();
    let a = write_tile(&temp.path().join("a.tif"), (0.0, 0.0, 1.0, 1.0), (10, 10), 1);
    let b = write_tile(&temp.path().join("b.tif"), (1.0, 0.0, 2.0, 1.0), (10, 10), 2);
    let out = temp.path().join("mosaic.tif");

    let summary = MosaicMerger::new(GeoTiffCodec).merge(&[a, b], &out).unwrap();

    assert_eq!(summary.inputs, 2);
    assert_eq!((summary.width, summary.height), (20, 10));
    assert!(summary
        .bounds
        .approx_eq(&BoundingBox::new(0.0, 0.0, 2.0, 1.0).unwrap(), 1e-9));

    let (info, pixels) = read_u8(&out);
    assert_eq!(info.pixel_count(), 200);
    assert!(info.bounds.approx_eq(&summary.bounds, 1e-9));
    // Left half from a, right half from b
    assert_eq!(pixels.iter().filter(|&&p| p == 1).count(), 100);
    assert_eq!(pixels.iter().filter(|&&p| p == 2).count(), 100);
    assert_eq!(pixels[0], 1);
    assert_eq!(pixels[19], 2);
}

#[test]
fn test_overlap_later_input_wins() {
    let temp = TempDir::new().unwrap();
    let a = write_tile(&temp.path().join("a.tif"), (0.0, 0.0, 2.0, 1.0), (20, 10), 1);
    let b = write_tile(&temp.path().join("b.tif"), (1.0, 0.0, 3.0, 1.0), (20, 10), 2);
    let out = temp.path().join("mosaic.tif");

    MosaicMerger::new(GeoTiffCodec)
        .merge(&[a.clone(), b.clone()], &out)
        .unwrap();
    let (_, pixels) = read_u8(&out);
    // Overlap column range 10..20 takes b's value
    assert_eq!(pixels[15], 2);
    assert_eq!(pixels[5], 1);

    MosaicMerger::new(GeoTiffCodec).merge(&[b, a], &out).unwrap();
    let (_, pixels) = read_u8(&out);
    assert_eq!(pixels[15], 1);
    assert_eq!(pixels[25], 2);
}

#[test]
fn test_gaps_are_zero_filled() {
    let temp = TempDir::new().unwrap();
    let a = write_tile(&temp.path().join("a.tif"), (0.0, 0.0, 1.0, 1.0), (4, 4), 7);
    let b = write_tile(&temp.path().join("b.tif"), (1.0, 1.0, 2.0, 2.0), (4, 4), 9);
    let out = temp.path().join("mosaic.tif");

    let summary = MosaicMerger::new(GeoTiffCodec).merge(&[a, b], &out).unwrap();
    assert_eq!((summary.width, summary.height), (8, 8));

    let (_, pixels) = read_u8(&out);
    // Top-left quadrant (north-west) has no input
    assert_eq!(pixels[0], 0);
    // Top-right quadrant is b, bottom-left is a
    assert_eq!(pixels[7], 9);
    assert_eq!(pixels[7 * 8], 7);
    assert_eq!(pixels.iter().filter(|&&p| p == 0).count(), 32);
}

#[test]
fn test_finest_resolution_is_used() {
    let temp = TempDir::new().unwrap();
    let coarse = write_tile(&temp.path().join("c.tif"), (0.0, 0.0, 1.0, 1.0), (2, 2), 3);
    let fine = write_tile(&temp.path().join("f.tif"), (1.0, 0.0, 2.0, 1.0), (8, 8), 4);
    let out = temp.path().join("mosaic.tif");

    let summary = MosaicMerger::new(GeoTiffCodec)
        .merge(&[coarse, fine], &out)
        .unwrap();

    assert_eq!((summary.width, summary.height), (16, 8));
    let (_, pixels) = read_u8(&out);
    // Coarse tile upsampled across the whole left half
    assert_eq!(pixels.iter().filter(|&&p| p == 3).count(), 64);
    assert_eq!(pixels.iter().filter(|&&p| p == 4).count(), 64);
}

#[test]
fn test_empty_input_list() {
    let temp = TempDir::new().unwrap();
    let result = MosaicMerger::new(GeoTiffCodec).merge(&[], &temp.path().join("m.tif"));
    assert!(matches!(result, Err(MergeError::NoTiles)));
    assert!(!temp.path().join("m.tif").exists());
}

#[test]
fn test_mixed_band_counts_rejected() {
    let temp = TempDir::new().unwrap();
    let a = write_tile(&temp.path().join("a.tif"), (0.0, 0.0, 1.0, 1.0), (2, 2), 1);
    let rgb_path = temp.path().join("rgb.tif");
    let info = RasterInfo {
        width: 2,
        height: 2,
        bands: 3,
        data_type: DataType::U8,
        crs: Crs::WGS84,
        bounds: BoundingBox::new(1.0, 0.0, 2.0, 1.0).unwrap(),
    };
    GeoTiffCodec.create(&rgb_path, &info).unwrap().finish().unwrap();

    let result = MosaicMerger::new(GeoTiffCodec).merge(&[a, rgb_path.clone()], &temp.path().join("m.tif"));
    match result {
        Err(MergeError::Incompatible { path, reason }) => {
            assert_eq!(path, rgb_path);
            assert!(reason.contains("bands"));
        }
        other => panic!("expected Incompatible, got {:?}", other),
    }
}

#[test]
fn test_unreadable_input_aborts() {
    let temp = TempDir::new().unwrap();
    let a = write_tile(&temp.path().join("a.tif"), (0.0, 0.0, 1.0, 1.0), (2, 2), 1);
    let junk = temp.path().join("junk.tif");
    std::fs::write(&junk, b"not a tiff at all").unwrap();

    let result = MosaicMerger::new(GeoTiffCodec).merge(&[a, junk.clone()], &temp.path().join("m.tif"));
    assert!(matches!(result, Err(MergeError::Raster { path, .. }) if path == junk));
}
