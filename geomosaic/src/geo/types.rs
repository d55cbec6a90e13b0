//! Bounding box type definitions

use std::fmt;

/// Valid latitude range (geographic, not Web Mercator)
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Axis-aligned rectangle in longitude/latitude degrees.
///
/// Immutable once created. The geographic constructor [`BoundingBox::new`]
/// enforces `min < max` on both axes and WGS84 ranges; raster extents in a
/// projected CRS go through [`BoundingBox::from_extent`], which only checks
/// ordering and finiteness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl BoundingBox {
    /// Creates a geographic bounding box.
    ///
    /// # Arguments
    ///
    /// * `min_lon` - Western edge (-180.0 to 180.0)
    /// * `min_lat` - Southern edge (-90.0 to 90.0)
    /// * `max_lon` - Eastern edge, strictly greater than `min_lon`
    /// * `max_lat` - Northern edge, strictly greater than `min_lat`
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, GeoError> {
        for lon in [min_lon, max_lon] {
            if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(GeoError::InvalidLongitude(lon));
            }
        }
        for lat in [min_lat, max_lat] {
            if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
                return Err(GeoError::InvalidLatitude(lat));
            }
        }
        Self::from_extent(min_lon, min_lat, max_lon, max_lat)
    }

    /// Creates a bounding box from an arbitrary planar extent.
    ///
    /// Used for raster bounds whose CRS may be projected (metres), so the
    /// WGS84 range checks of [`BoundingBox::new`] do not apply.
    pub fn from_extent(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, GeoError> {
        let values = [min_x, min_y, max_x, max_y];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeoError::NonFinite);
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(GeoError::Degenerate {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min_lon: min_x,
            min_lat: min_y,
            max_lon: max_x,
            max_lat: max_y,
        })
    }

    #[inline]
    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    #[inline]
    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    #[inline]
    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    #[inline]
    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// East-west extent.
    #[inline]
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// North-south extent.
    #[inline]
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Width divided by height.
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        self.width() / self.height()
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Overlapping region, or `None` when the boxes only touch or are disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min_lon = self.min_lon.max(other.min_lon);
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lon = self.max_lon.min(other.max_lon);
        let max_lat = self.max_lat.min(other.max_lat);
        if min_lon < max_lon && min_lat < max_lat {
            Some(BoundingBox {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            })
        } else {
            None
        }
    }

    /// Returns true if `other` lies entirely inside `self` (within `epsilon`).
    pub fn contains(&self, other: &BoundingBox, epsilon: f64) -> bool {
        other.min_lon >= self.min_lon - epsilon
            && other.min_lat >= self.min_lat - epsilon
            && other.max_lon <= self.max_lon + epsilon
            && other.max_lat <= self.max_lat + epsilon
    }

    /// Corner-wise comparison within `epsilon`.
    pub fn approx_eq(&self, other: &BoundingBox, epsilon: f64) -> bool {
        (self.min_lon - other.min_lon).abs() <= epsilon
            && (self.min_lat - other.min_lat).abs() <= epsilon
            && (self.max_lon - other.max_lon).abs() <= epsilon
            && (self.max_lat - other.max_lat).abs() <= epsilon
    }

    /// Returns `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Errors that can occur when constructing a bounding box.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoError {
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Latitude is outside valid range (-90.0 to 90.0)
    InvalidLatitude(f64),
    /// A coordinate is NaN or infinite
    NonFinite,
    /// Minimum is not strictly less than maximum on some axis
    Degenerate {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
}

impl fmt::Display for GeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoError::InvalidLongitude(lon) => write!(
                f,
                "Invalid longitude: {} (must be between {} and {})",
                lon, MIN_LON, MAX_LON
            ),
            GeoError::InvalidLatitude(lat) => write!(
                f,
                "Invalid latitude: {} (must be between {} and {})",
                lat, MIN_LAT, MAX_LAT
            ),
            GeoError::NonFinite => write!(f, "Bounding box coordinates must be finite"),
            GeoError::Degenerate {
                min_x,
                min_y,
                max_x,
                max_y,
            } => write!(
                f,
                "Degenerate bounding box [{}, {}, {}, {}]: min must be less than max",
                min_x, min_y, max_x, max_y
            ),
        }
    }
}

impl std::error::Error for GeoError {}
