//! Single-attempt tile download.

use crate::provider::{AsyncHttpClient, ImageQuery, ImageryProvider, ProviderError};
use crate::request::DownloadRequest;
use crate::tiler::Tile;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Raster format requested from providers.
pub const GEOTIFF_FORMAT: &str = "GEO_TIFF";

/// A tile file written to disk by one successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Why a single fetch attempt failed. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("image request failed: {0}")]
    Image(ProviderError),

    #[error("download URL request failed: {0}")]
    Url(ProviderError),

    #[error("download failed: {0}")]
    Download(ProviderError),

    #[error("empty response from {url}")]
    EmptyBody { url: String },

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// One attempt at acquiring a tile.
///
/// Implementations write the tile to `tile.output_path` and report the
/// result; retrying and validation are the caller's concern.
pub trait TileFetcher: Send + Sync {
    fn fetch(
        &self,
        tile: &Tile,
        request: &DownloadRequest,
    ) -> impl Future<Output = Result<FetchedTile, FetchError>> + Send;

    /// Whether requests for `sensor` can be served at all.
    fn supports_sensor(&self, _sensor: &str) -> bool {
        true
    }
}

/// Fetcher backed by an [`ImageryProvider`] and an [`AsyncHttpClient`].
///
/// Each attempt asks the provider for a filtered image, then for a download
/// URL clipped to the tile, then streams the response to disk. The three
/// steps together are bounded by one timeout.
pub struct ProviderTileFetcher<P, H> {
    provider: Arc<P>,
    http: Arc<H>,
    format: String,
    timeout: Duration,
}

impl<P: ImageryProvider, H: AsyncHttpClient> ProviderTileFetcher<P, H> {
    pub fn new(provider: Arc<P>, http: Arc<H>, timeout: Duration) -> Self {
        Self {
            provider,
            http,
            format: GEOTIFF_FORMAT.to_string(),
            timeout,
        }
    }

    /// Overrides the format string passed to the provider.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn attempt(&self, tile: &Tile, request: &DownloadRequest) -> Result<FetchedTile, FetchError> {
        let query = ImageQuery {
            sensor: request.sensor().to_string(),
            start: request.start_date(),
            end: request.end_date(),
            bbox: tile.bbox,
            max_cloud_cover_pct: request
                .cloud_mask()
                .then(|| request.max_cloud_cover_pct()),
        };

        let image = self
            .provider
            .filtered_image(&query)
            .await
            .map_err(FetchError::Image)?;

        let url = self
            .provider
            .download_url(&image, &tile.bbox, request.resolution_meters(), &self.format)
            .await
            .map_err(FetchError::Url)?;

        trace!(tile = tile.index, url = %url, "Downloading tile");

        let bytes = self
            .http
            .download_to_file(&url, &tile.output_path)
            .await
            .map_err(FetchError::Download)?;

        if bytes == 0 {
            return Err(FetchError::EmptyBody { url });
        }

        debug!(
            tile = tile.index,
            provider = self.provider.name(),
            bytes = bytes,
            "Tile downloaded"
        );

        Ok(FetchedTile {
            path: tile.output_path.clone(),
            bytes,
        })
    }
}

impl<P: ImageryProvider, H: AsyncHttpClient> TileFetcher for ProviderTileFetcher<P, H> {
    async fn fetch(&self, tile: &Tile, request: &DownloadRequest) -> Result<FetchedTile, FetchError> {
        match tokio::time::timeout(self.timeout, self.attempt(tile, request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    fn supports_sensor(&self, sensor: &str) -> bool {
        self.provider.supports_sensor(sensor)
    }
}
