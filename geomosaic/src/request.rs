//! Download request definition and validation.
//!
//! A [`DownloadRequest`] is built once from user input through
//! [`DownloadRequestBuilder`], validated in a single pass, and never mutated
//! afterwards. The download manager re-runs [`DownloadRequest::validate`] at
//! submission time so a request built yesterday cannot sneak in a future date.

use crate::geo::{BoundingBox, GeoError};
use crate::tiler::TilingMethod;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default maximum scene cloud cover accepted by the provider filter.
pub const DEFAULT_MAX_CLOUD_COVER_PCT: f64 = 20.0;

/// Default output resolution in metres per pixel.
pub const DEFAULT_RESOLUTION_METERS: u32 = 30;

/// Default degree tile size.
pub const DEFAULT_TILE_SIZE_DEGREES: f64 = 0.5;

/// Upper bound on tiles per request.
///
/// A tiny tile size over a continent would otherwise queue millions of
/// provider calls.
pub const MAX_TILES_PER_REQUEST: usize = 10_000;

/// Errors raised when a request is malformed.
///
/// These are surfaced synchronously to the caller; an invalid request never
/// starts an operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid area of interest: {0}")]
    InvalidArea(#[from] GeoError),

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("End date {end} is in the future (today is {today})")]
    FutureEndDate { end: NaiveDate, today: NaiveDate },

    #[error("Maximum cloud cover {0}% must be between 0 and 100")]
    CloudCoverOutOfRange(f64),

    #[error("Invalid tiling parameters: {0}")]
    InvalidTiling(TilingMethod),

    #[error("Request would produce {count} tiles (maximum {max})")]
    TooManyTiles { count: usize, max: usize },

    #[error("Resolution must be at least 1 metre, got {0}")]
    InvalidResolution(u32),

    #[error("Sensor name must not be empty")]
    EmptySensor,

    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    #[error("Output directory must not be empty")]
    EmptyOutputDir,
}

/// A fully specified imagery acquisition request.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    area_of_interest: BoundingBox,
    start_date: NaiveDate,
    end_date: NaiveDate,
    sensor: String,
    output_dir: PathBuf,
    cloud_mask: bool,
    max_cloud_cover_pct: f64,
    tiling_method: TilingMethod,
    resolution_meters: u32,
}

impl DownloadRequest {
    /// Starts building a request.
    pub fn builder() -> DownloadRequestBuilder {
        DownloadRequestBuilder::default()
    }

    pub fn area_of_interest(&self) -> &BoundingBox {
        &self.area_of_interest
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether the provider should apply its cloud filter.
    pub fn cloud_mask(&self) -> bool {
        self.cloud_mask
    }

    pub fn max_cloud_cover_pct(&self) -> f64 {
        self.max_cloud_cover_pct
    }

    pub fn tiling_method(&self) -> &TilingMethod {
        &self.tiling_method
    }

    pub fn resolution_meters(&self) -> u32 {
        self.resolution_meters
    }

    /// Name of the merged output file, e.g. `mosaic_LANDSAT_8_2024-01-01_2024-02-01.tif`.
    pub fn mosaic_file_name(&self) -> String {
        let sensor: String = self
            .sensor
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!(
            "mosaic_{}_{}_{}.tif",
            sensor,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }

    /// Full path of the merged output file.
    pub fn mosaic_path(&self) -> PathBuf {
        self.output_dir.join(self.mosaic_file_name())
    }

    /// Checks every invariant, failing on the first violation.
    ///
    /// `today` is the upper bound for `end_date`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if self.sensor.trim().is_empty() {
            return Err(ValidationError::EmptySensor);
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyOutputDir);
        }
        if self.start_date > self.end_date {
            return Err(ValidationError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.end_date > today {
            return Err(ValidationError::FutureEndDate {
                end: self.end_date,
                today,
            });
        }
        if !(0.0..=100.0).contains(&self.max_cloud_cover_pct) {
            return Err(ValidationError::CloudCoverOutOfRange(self.max_cloud_cover_pct));
        }
        if !self.tiling_method.is_valid() {
            return Err(ValidationError::InvalidTiling(self.tiling_method));
        }
        let count = self.tiling_method.estimate_tile_count(&self.area_of_interest);
        if count > MAX_TILES_PER_REQUEST {
            return Err(ValidationError::TooManyTiles {
                count,
                max: MAX_TILES_PER_REQUEST,
            });
        }
        if self.resolution_meters == 0 {
            return Err(ValidationError::InvalidResolution(self.resolution_meters));
        }
        Ok(())
    }
}

/// Builder for [`DownloadRequest`].
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use geomosaic::request::DownloadRequest;
/// use geomosaic::tiler::TilingMethod;
///
/// let request = DownloadRequest::builder()
///     .area(0.0, 0.0, 2.0, 2.0)
///     .dates(
///         NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
///         NaiveDate::from_ymd_opt(2023, 8, 31).unwrap(),
///     )
///     .sensor("LANDSAT_8")
///     .output_dir("/tmp/mosaic")
///     .tiling(TilingMethod::Degree { tile_size: 1.0 })
///     .build()
///     .unwrap();
///
/// assert_eq!(request.resolution_meters(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct DownloadRequestBuilder {
    area: Option<Result<BoundingBox, GeoError>>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    sensor: Option<String>,
    output_dir: Option<PathBuf>,
    cloud_mask: bool,
    max_cloud_cover_pct: f64,
    tiling_method: TilingMethod,
    resolution_meters: u32,
}

impl Default for DownloadRequestBuilder {
    fn default() -> Self {
        Self {
            area: None,
            start_date: None,
            end_date: None,
            sensor: None,
            output_dir: None,
            cloud_mask: true,
            max_cloud_cover_pct: DEFAULT_MAX_CLOUD_COVER_PCT,
            tiling_method: TilingMethod::Degree {
                tile_size: DEFAULT_TILE_SIZE_DEGREES,
            },
            resolution_meters: DEFAULT_RESOLUTION_METERS,
        }
    }
}

impl DownloadRequestBuilder {
    /// Sets the area of interest from raw corner values.
    ///
    /// Invalid corners are reported by [`build`](Self::build).
    pub fn area(mut self, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        self.area = Some(BoundingBox::new(min_lon, min_lat, max_lon, max_lat));
        self
    }

    /// Sets the area of interest from an existing bounding box.
    pub fn area_of_interest(mut self, bbox: BoundingBox) -> Self {
        self.area = Some(Ok(bbox));
        self
    }

    /// Sets the inclusive acquisition date range.
    pub fn dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn sensor(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = Some(sensor.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn cloud_mask(mut self, enabled: bool) -> Self {
        self.cloud_mask = enabled;
        self
    }

    pub fn max_cloud_cover_pct(mut self, pct: f64) -> Self {
        self.max_cloud_cover_pct = pct;
        self
    }

    pub fn tiling(mut self, method: TilingMethod) -> Self {
        self.tiling_method = method;
        self
    }

    pub fn resolution_meters(mut self, meters: u32) -> Self {
        self.resolution_meters = meters;
        self
    }

    /// Builds and validates against today's UTC date.
    pub fn build(self) -> Result<DownloadRequest, ValidationError> {
        self.build_as_of(Utc::now().date_naive())
    }

    /// Builds and validates against an explicit `today`.
    pub fn build_as_of(self, today: NaiveDate) -> Result<DownloadRequest, ValidationError> {
        let area_of_interest = self.area.ok_or(ValidationError::MissingField("area"))??;
        let start_date = self
            .start_date
            .ok_or(ValidationError::MissingField("start_date"))?;
        let end_date = self.end_date.ok_or(ValidationError::MissingField("end_date"))?;
        let sensor = self.sensor.ok_or(ValidationError::MissingField("sensor"))?;
        let output_dir = self
            .output_dir
            .ok_or(ValidationError::MissingField("output_dir"))?;

        let request = DownloadRequest {
            area_of_interest,
            start_date,
            end_date,
            sensor,
            output_dir,
            cloud_mask: self.cloud_mask,
            max_cloud_cover_pct: self.max_cloud_cover_pct,
            tiling_method: self.tiling_method,
            resolution_meters: self.resolution_meters,
        };
        request.validate(today)?;
        Ok(request)
    }
}
