//! Grid generation for both tiling policies.

use crate::geo::BoundingBox;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Slack used when deciding whether one more degree step is needed.
///
/// Prevents `2.0000000001 / 1.0` from producing a sliver third column.
const STEP_EPSILON: f64 = 1e-9;

/// Upper bound on the initial allocation of a tile vector.
const MAX_PREALLOCATED_TILES: usize = 4096;

/// Policy used to split the area of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TilingMethod {
    /// Fixed tile size in degrees along both axes.
    Degree {
        /// Tile edge length in degrees
        tile_size: f64,
    },
    /// Approximately `target_count` tiles whose aspect ratio follows the
    /// area's. The resulting count is close to, not exactly, the target.
    PixelGrid {
        /// Desired number of tiles
        target_count: u32,
    },
}

impl TilingMethod {
    /// Returns true if these parameters can produce a grid.
    pub fn is_valid(&self) -> bool {
        match *self {
            TilingMethod::Degree { tile_size } => tile_size.is_finite() && tile_size > 0.0,
            TilingMethod::PixelGrid { target_count } => target_count > 0,
        }
    }

    /// Predicts how many tiles [`compute_tiles`] will produce for `bbox`.
    pub fn estimate_tile_count(&self, bbox: &BoundingBox) -> usize {
        if !self.is_valid() || bbox.area() <= 0.0 {
            return 1;
        }
        match *self {
            TilingMethod::Degree { tile_size } => {
                degree_steps(bbox.width(), tile_size)
                    .saturating_mul(degree_steps(bbox.height(), tile_size))
            }
            TilingMethod::PixelGrid { target_count } => {
                let (rows, cols) = pixel_grid_shape(bbox, target_count);
                rows.saturating_mul(cols)
            }
        }
    }
}

impl fmt::Display for TilingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilingMethod::Degree { tile_size } => write!(f, "degree({}°)", tile_size),
            TilingMethod::PixelGrid { target_count } => write!(f, "pixel-grid(~{})", target_count),
        }
    }
}

/// One rectangular sub-region of the area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Position in generation order, unique within one request
    pub index: usize,
    /// Geographic extent of this tile
    pub bbox: BoundingBox,
    /// Where the downloaded raster is written
    pub output_path: PathBuf,
}

impl Tile {
    /// Creates a tile whose output file lives in `output_dir`.
    pub fn new(index: usize, bbox: BoundingBox, output_dir: &Path) -> Self {
        Self {
            index,
            bbox,
            output_path: output_dir.join(Self::file_name(index)),
        }
    }

    /// Deterministic file name for a tile index (`tile_0007.tif`).
    pub fn file_name(index: usize) -> String {
        format!("tile_{:04}.tif", index)
    }
}

/// Splits `bbox` into tiles according to `method`.
///
/// Tiles are indexed `0..N` in generation order. Degree tiles walk longitude
/// (outer) then latitude (inner); pixel-grid tiles walk rows south to north,
/// each row west to east.
pub fn compute_tiles(bbox: &BoundingBox, method: &TilingMethod, output_dir: &Path) -> Vec<Tile> {
    if !method.is_valid() || bbox.area() <= 0.0 {
        warn!(
            bbox = %bbox,
            method = %method,
            "Degenerate tiling parameters, using a single tile"
        );
        return vec![Tile::new(0, *bbox, output_dir)];
    }

    let tiles = match *method {
        TilingMethod::Degree { tile_size } => degree_tiles(bbox, tile_size, output_dir),
        TilingMethod::PixelGrid { target_count } => pixel_grid_tiles(bbox, target_count, output_dir),
    };

    if tiles.is_empty() {
        warn!(bbox = %bbox, method = %method, "Grid produced no tiles, using a single tile");
        return vec![Tile::new(0, *bbox, output_dir)];
    }

    debug!(bbox = %bbox, method = %method, count = tiles.len(), "Computed tile grid");
    tiles
}

/// Number of `step`-sized intervals needed to cover `extent`.
fn degree_steps(extent: f64, step: f64) -> usize {
    ((extent / step) - STEP_EPSILON).ceil().max(1.0) as usize
}

/// Edge `i` of `n` along an axis starting at `min`; the last edge is `max`.
fn degree_edge(min: f64, max: f64, step: f64, i: usize, n: usize) -> f64 {
    if i >= n {
        max
    } else {
        (min + step * i as f64).min(max)
    }
}

fn degree_tiles(bbox: &BoundingBox, tile_size: f64, output_dir: &Path) -> Vec<Tile> {
    let cols = degree_steps(bbox.width(), tile_size);
    let rows = degree_steps(bbox.height(), tile_size);
    let mut tiles = Vec::with_capacity(cols.saturating_mul(rows).min(MAX_PREALLOCATED_TILES));

    for col in 0..cols {
        let west = degree_edge(bbox.min_lon(), bbox.max_lon(), tile_size, col, cols);
        let east = degree_edge(bbox.min_lon(), bbox.max_lon(), tile_size, col + 1, cols);
        for row in 0..rows {
            let south = degree_edge(bbox.min_lat(), bbox.max_lat(), tile_size, row, rows);
            let north = degree_edge(bbox.min_lat(), bbox.max_lat(), tile_size, row + 1, rows);
            if let Ok(cell) = BoundingBox::from_extent(west, south, east, north) {
                tiles.push(Tile::new(tiles.len(), cell, output_dir));
            }
        }
    }
    tiles
}

/// Rows and columns for a pixel grid, each at least one.
fn pixel_grid_shape(bbox: &BoundingBox, target_count: u32) -> (usize, usize) {
    let aspect = bbox.aspect_ratio();
    let target = target_count as f64;
    // Clamped to the target so extreme aspect ratios cannot explode the grid
    let rows = (target / aspect).sqrt().round().clamp(1.0, target);
    let cols = (aspect * rows).round().clamp(1.0, target);
    (rows as usize, cols as usize)
}

/// Edge `i` of `n` evenly spaced divisions; the last edge is snapped to `max`.
fn even_edge(min: f64, max: f64, i: usize, n: usize) -> f64 {
    if i >= n {
        max
    } else {
        min + (max - min) * i as f64 / n as f64
    }
}

fn pixel_grid_tiles(bbox: &BoundingBox, target_count: u32, output_dir: &Path) -> Vec<Tile> {
    let (rows, cols) = pixel_grid_shape(bbox, target_count);
    let mut tiles = Vec::with_capacity(rows.saturating_mul(cols).min(MAX_PREALLOCATED_TILES));

    for row in 0..rows {
        let south = even_edge(bbox.min_lat(), bbox.max_lat(), row, rows);
        let north = even_edge(bbox.min_lat(), bbox.max_lat(), row + 1, rows);
        for col in 0..cols {
            let west = even_edge(bbox.min_lon(), bbox.max_lon(), col, cols);
            let east = even_edge(bbox.min_lon(), bbox.max_lon(), col + 1, cols);
            if let Ok(cell) = BoundingBox::from_extent(west, south, east, north) {
                tiles.push(Tile::new(tiles.len(), cell, output_dir));
            }
        }
    }
    tiles
}
