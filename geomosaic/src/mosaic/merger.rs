//! Last-writer-wins mosaic of georeferenced tiles.

use super::codec::{RasterCodec, RasterReader, RasterWriter};
use super::raster::{Crs, DataType, RasterError, RasterInfo};
use crate::geo::BoundingBox;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Tolerance, in pixels, when snapping extents to the output grid.
const GRID_EPSILON: f64 = 1e-6;

/// Errors that abort a merge.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no tiles to merge")]
    NoTiles,

    #[error("{path} is incompatible with the mosaic: {reason}")]
    Incompatible { path: PathBuf, reason: String },

    #[error("raster error on {path}: {source}")]
    Raster {
        path: PathBuf,
        #[source]
        source: RasterError,
    },
}

impl MergeError {
    fn raster(path: &Path) -> impl FnOnce(RasterError) -> MergeError + '_ {
        move |source| MergeError::Raster {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a completed merge produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicSummary {
    pub output_path: PathBuf,
    pub inputs: usize,
    pub width: u32,
    pub height: u32,
    pub bands: u16,
    pub data_type: DataType,
    pub crs: Crs,
    pub bounds: BoundingBox,
}

/// Merges tiles into one raster using a [`RasterCodec`].
///
/// The output covers the union of the input extents at the finest input
/// resolution on each axis. Inputs are pasted in list order with
/// nearest-neighbour sampling, so where tiles overlap the later one wins.
/// Pixels covered by no input stay zero.
#[derive(Debug, Clone, Default)]
pub struct MosaicMerger<C> {
    codec: C,
}

impl<C: RasterCodec> MosaicMerger<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Merges `inputs` into `output`. Blocking; run it off the async runtime.
    pub fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<MosaicSummary, MergeError> {
        let started = Instant::now();
        let infos = self.read_infos(inputs)?;
        let out = output_info(&infos);

        info!(
            inputs = inputs.len(),
            width = out.width,
            height = out.height,
            bands = out.bands,
            crs = %out.crs,
            "Merging tiles"
        );

        let mut writer = self
            .codec
            .create(output, &out)
            .map_err(MergeError::raster(output))?;

        for (path, tile) in inputs.iter().zip(&infos) {
            let Some(placement) = Placement::compute(tile, &out) else {
                debug!(path = %path.display(), "Tile outside mosaic grid, skipped");
                continue;
            };

            // Each reader is dropped at the end of its iteration
            let mut reader = self.codec.open(path).map_err(MergeError::raster(path))?;
            let pixels = reader.read_pixels().map_err(MergeError::raster(path))?;
            let region = pixels.resample(&placement.src_rows, &placement.src_cols);
            writer
                .write_region(placement.x, placement.y, &region)
                .map_err(MergeError::raster(output))?;
        }

        writer.finish().map_err(MergeError::raster(output))?;

        info!(
            output = %output.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Mosaic written"
        );

        Ok(MosaicSummary {
            output_path: output.to_path_buf(),
            inputs: inputs.len(),
            width: out.width,
            height: out.height,
            bands: out.bands,
            data_type: out.data_type,
            crs: out.crs,
            bounds: out.bounds,
        })
    }

    /// Opens every input for metadata and checks they can share one raster.
    fn read_infos(&self, inputs: &[PathBuf]) -> Result<Vec<RasterInfo>, MergeError> {
        let first = inputs.first().ok_or(MergeError::NoTiles)?;
        let mut infos = Vec::with_capacity(inputs.len());

        for path in inputs {
            let info = *self
                .codec
                .open(path)
                .map_err(MergeError::raster(path))?
                .info();

            if let Some(reference) = infos.first() {
                check_compatible(reference, &info).map_err(|reason| MergeError::Incompatible {
                    path: path.clone(),
                    reason: format!("{} (reference: {})", reason, first.display()),
                })?;
            }
            infos.push(info);
        }
        Ok(infos)
    }
}

fn check_compatible(reference: &RasterInfo, other: &RasterInfo) -> Result<(), String> {
    if other.crs != reference.crs {
        return Err(format!("CRS {} differs from {}", other.crs, reference.crs));
    }
    if other.bands != reference.bands {
        return Err(format!(
            "{} bands differs from {}",
            other.bands, reference.bands
        ));
    }
    if other.data_type != reference.data_type {
        return Err(format!(
            "{} samples differ from {}",
            other.data_type, reference.data_type
        ));
    }
    Ok(())
}

/// Union extent at the finest per-axis resolution.
fn output_info(infos: &[RasterInfo]) -> RasterInfo {
    let first = infos[0];
    let mut bounds = first.bounds;
    let mut res_x = first.pixel_width();
    let mut res_y = first.pixel_height();
    for info in &infos[1..] {
        bounds = bounds.union(&info.bounds);
        res_x = res_x.min(info.pixel_width());
        res_y = res_y.min(info.pixel_height());
    }

    let width = grid_len(bounds.width(), res_x);
    let height = grid_len(bounds.height(), res_y);
    let left = bounds.min_lon();
    let top = bounds.max_lat();

    RasterInfo {
        width,
        height,
        bands: first.bands,
        data_type: first.data_type,
        crs: first.crs,
        // Extent snapped to whole pixels; positive sizes keep this valid
        bounds: BoundingBox::from_extent(
            left,
            top - height as f64 * res_y,
            left + width as f64 * res_x,
            top,
        )
        .unwrap_or(bounds),
    }
}

fn grid_len(extent: f64, resolution: f64) -> u32 {
    ((extent / resolution - GRID_EPSILON).ceil() as u32).max(1)
}

/// Where a tile lands in the output and which source pixel feeds each
/// output pixel.
struct Placement {
    x: u32,
    y: u32,
    src_rows: Vec<u32>,
    src_cols: Vec<u32>,
}

impl Placement {
    fn compute(tile: &RasterInfo, out: &RasterInfo) -> Option<Placement> {
        let res_x = out.pixel_width();
        let res_y = out.pixel_height();
        let left = out.bounds.min_lon();
        let top = out.bounds.max_lat();

        let col_start = snap((tile.bounds.min_lon() - left) / res_x, out.width);
        let col_end = snap((tile.bounds.max_lon() - left) / res_x, out.width);
        let row_start = snap((top - tile.bounds.max_lat()) / res_y, out.height);
        let row_end = snap((top - tile.bounds.min_lat()) / res_y, out.height);
        if col_end <= col_start || row_end <= row_start {
            return None;
        }

        let tile_res_x = tile.pixel_width();
        let tile_res_y = tile.pixel_height();

        let src_cols = (col_start..col_end)
            .map(|col| {
                let x = left + (col as f64 + 0.5) * res_x;
                source_index((x - tile.bounds.min_lon()) / tile_res_x, tile.width)
            })
            .collect();
        let src_rows = (row_start..row_end)
            .map(|row| {
                let y = top - (row as f64 + 0.5) * res_y;
                source_index((tile.bounds.max_lat() - y) / tile_res_y, tile.height)
            })
            .collect();

        Some(Placement {
            x: col_start,
            y: row_start,
            src_rows,
            src_cols,
        })
    }
}

/// Rounds a fractional grid position to the nearest pixel edge in `0..=len`.
fn snap(position: f64, len: u32) -> u32 {
    position.round().clamp(0.0, len as f64) as u32
}

fn source_index(position: f64, len: u32) -> u32 {
    (position.floor().max(0.0) as u32).min(len.saturating_sub(1))
}
