//! URL template provider
//!
//! Many imagery services (WCS endpoints, tile export gateways) render a
//! filtered composite directly from query parameters. This provider builds
//! the download URL from a template and does no server-side pre-rendering.

use super::types::{ImageQuery, ImageRef, ImageryProvider, ProviderError};
use crate::geo::BoundingBox;
use std::collections::BTreeSet;

/// Date format used for `{start}` and `{end}`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Provider that fills a URL template with request parameters.
///
/// Supported placeholders:
///
/// | Placeholder | Value |
/// |-------------|-------|
/// | `{sensor}` | sensor identifier |
/// | `{start}`, `{end}` | acquisition dates, `YYYY-MM-DD` |
/// | `{west}`, `{south}`, `{east}`, `{north}` | tile bounds in degrees |
/// | `{scale}` | resolution in metres |
/// | `{format}` | raster format name |
/// | `{cloud}` | max cloud cover percent, empty when masking is off |
///
/// An empty sensor list accepts every sensor.
#[derive(Debug, Clone)]
pub struct UrlTemplateProvider {
    template: String,
    sensors: BTreeSet<String>,
}

impl UrlTemplateProvider {
    pub fn new<I, S>(template: impl Into<String>, sensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            template: template.into(),
            sensors: sensors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Sensors this provider accepts, sorted.
    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(String::as_str)
    }

    fn render(&self, query: &ImageQuery, bbox: &BoundingBox, scale: u32, format: &str) -> String {
        let cloud = query
            .max_cloud_cover_pct
            .map(|pct| format!("{}", pct))
            .unwrap_or_default();

        self.template
            .replace("{sensor}", &query.sensor)
            .replace("{start}", &query.start.format(DATE_FORMAT).to_string())
            .replace("{end}", &query.end.format(DATE_FORMAT).to_string())
            .replace("{west}", &bbox.min_lon().to_string())
            .replace("{south}", &bbox.min_lat().to_string())
            .replace("{east}", &bbox.max_lon().to_string())
            .replace("{north}", &bbox.max_lat().to_string())
            .replace("{scale}", &scale.to_string())
            .replace("{format}", format)
            .replace("{cloud}", &cloud)
    }
}

impl ImageryProvider for UrlTemplateProvider {
    async fn filtered_image(&self, query: &ImageQuery) -> Result<ImageRef, ProviderError> {
        if !self.supports_sensor(&query.sensor) {
            return Err(ProviderError::UnsupportedSensor(query.sensor.clone()));
        }
        let id = format!(
            "{}:{}:{}",
            query.sensor,
            query.start.format(DATE_FORMAT),
            query.end.format(DATE_FORMAT)
        );
        Ok(ImageRef::new(id, query.clone()))
    }

    async fn download_url(
        &self,
        image: &ImageRef,
        bbox: &BoundingBox,
        resolution_meters: u32,
        format: &str,
    ) -> Result<String, ProviderError> {
        Ok(self.render(image.query(), bbox, resolution_meters, format))
    }

    fn name(&self) -> &str {
        "url-template"
    }

    fn supports_sensor(&self, sensor: &str) -> bool {
        self.sensors.is_empty() || self.sensors.contains(sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn query(sensor: &str, cloud: Option<f64>) -> ImageQuery {
        ImageQuery {
            sensor: sensor.to_string(),
            start: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            bbox: BoundingBox::new(10.0, 45.0, 11.0, 46.0).unwrap(),
            max_cloud_cover_pct: cloud,
        }
    }

    #[tokio::test]
    async fn test_renders_all_placeholders() {
        let provider = UrlTemplateProvider::new(
            "https://x.test/{sensor}?t={start}/{end}&b={west},{south},{east},{north}&r={scale}&f={format}&c={cloud}",
            ["LANDSAT_8"],
        );
        let image = provider
            .filtered_image(&query("LANDSAT_8", Some(20.0)))
            .await
            .unwrap();
        let bbox = BoundingBox::new(10.0, 45.0, 10.5, 45.5).unwrap();

        let url = provider
            .download_url(&image, &bbox, 30, "GEO_TIFF")
            .await
            .unwrap();

        assert_eq!(
            url,
            "https://x.test/LANDSAT_8?t=2023-06-01/2023-06-30&b=10,45,10.5,45.5&r=30&f=GEO_TIFF&c=20"
        );
    }

    #[tokio::test]
    async fn test_cloud_placeholder_empty_without_mask() {
        let provider = UrlTemplateProvider::new("c={cloud}", Vec::<String>::new());
        let image = provider
            .filtered_image(&query("ANY", None))
            .await
            .unwrap();
        let url = provider
            .download_url(&image, &image.query().bbox, 10, "GEO_TIFF")
            .await
            .unwrap();
        assert_eq!(url, "c=");
    }

    #[tokio::test]
    async fn test_rejects_unknown_sensor() {
        let provider = UrlTemplateProvider::new("{sensor}", ["SENTINEL_2"]);
        let result = provider.filtered_image(&query("MODIS", None)).await;
        assert_eq!(
            result,
            Err(ProviderError::UnsupportedSensor("MODIS".to_string()))
        );
    }

    #[test]
    fn test_empty_allow_list_accepts_everything() {
        let provider = UrlTemplateProvider::new("{sensor}", Vec::<String>::new());
        assert!(provider.supports_sensor("WHATEVER"));
        assert_eq!(provider.sensors().count(), 0);
    }

    #[tokio::test]
    async fn test_image_id_encodes_query() {
        let provider = UrlTemplateProvider::new("{sensor}", ["LANDSAT_8"]);
        let image = provider
            .filtered_image(&query("LANDSAT_8", None))
            .await
            .unwrap();
        assert_eq!(image.id(), "LANDSAT_8:2023-06-01:2023-06-30");
    }
}
