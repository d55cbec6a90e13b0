//! Provider types and traits

use crate::geo::BoundingBox;
use chrono::NaiveDate;
use std::fmt;
use std::future::Future;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP request failed before a response was received
    HttpError(String),
    /// Server answered with a non-success status
    HttpStatus { status: u16, url: String },
    /// Request exceeded its deadline
    Timeout(String),
    /// Sensor is not offered by this provider
    UnsupportedSensor(String),
    /// Local file error while storing a response
    Io(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::HttpStatus { status, url } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            ProviderError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            ProviderError::UnsupportedSensor(sensor) => {
                write!(f, "Sensor {} not supported by provider", sensor)
            }
            ProviderError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

/// Parameters of a filtered, composited image request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    /// Sensor / collection identifier
    pub sensor: String,
    /// First acquisition date (inclusive)
    pub start: NaiveDate,
    /// Last acquisition date (inclusive)
    pub end: NaiveDate,
    /// Region to render
    pub bbox: BoundingBox,
    /// Server-side scene cloud filter, `None` when masking is disabled
    pub max_cloud_cover_pct: Option<f64>,
}

/// Opaque reference to a rendered image held by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    id: String,
    query: ImageQuery,
}

impl ImageRef {
    pub fn new(id: impl Into<String>, query: ImageQuery) -> Self {
        Self {
            id: id.into(),
            query,
        }
    }

    /// Provider-assigned identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Query this image was rendered for.
    pub fn query(&self) -> &ImageQuery {
        &self.query
    }
}

/// Async trait for satellite imagery providers.
///
/// Implementors own all sensor semantics (band selection, cloud masking,
/// scaling). The core only needs "render rectangle X for sensor Y over
/// dates D1..D2" and "give me a URL to download it".
///
/// Both calls may fail transiently; callers retry them as a unit.
pub trait ImageryProvider: Send + Sync {
    /// Renders a filtered composite for `query`.
    fn filtered_image(
        &self,
        query: &ImageQuery,
    ) -> impl Future<Output = Result<ImageRef, ProviderError>> + Send;

    /// Produces a short-lived download URL for `image` clipped to `bbox`.
    ///
    /// # Arguments
    ///
    /// * `image` - Image returned by [`filtered_image`](Self::filtered_image)
    /// * `bbox` - Region to export
    /// * `resolution_meters` - Pixel size in metres
    /// * `format` - Raster format understood by the codec (e.g. `GEO_TIFF`)
    fn download_url(
        &self,
        image: &ImageRef,
        bbox: &BoundingBox,
        resolution_meters: u32,
        format: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// Checks if this provider offers the given sensor.
    fn supports_sensor(&self, sensor: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::HttpStatus {
            status: 503,
            url: "http://example.com/a".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from http://example.com/a");
        assert_eq!(
            ProviderError::UnsupportedSensor("MODIS".to_string()).to_string(),
            "Sensor MODIS not supported by provider"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ProviderError = io.into();
        assert!(matches!(err, ProviderError::Io(msg) if msg.contains("denied")));
    }

    #[test]
    fn test_image_ref_accessors() {
        let query = ImageQuery {
            sensor: "SENTINEL_2".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap(),
            max_cloud_cover_pct: Some(10.0),
        };
        let image = ImageRef::new("composite-1", query.clone());
        assert_eq!(image.id(), "composite-1");
        assert_eq!(image.query(), &query);
    }
}
