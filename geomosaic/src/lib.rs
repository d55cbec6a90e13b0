//! geomosaic - tiled satellite imagery acquisition
//!
//! Downloads an area of interest that is too large for a single imagery
//! service request: the area is split into tiles, the tiles are fetched
//! concurrently with retries, and the successful tiles are merged into one
//! GeoTIFF mosaic.
//!
//! # High-Level API
//!
//! ```ignore
//! use geomosaic::config::DownloadConfig;
//! use geomosaic::download::DownloadManager;
//! use geomosaic::fetch::ProviderTileFetcher;
//! use geomosaic::mosaic::GeoTiffCodec;
//! use geomosaic::provider::{AsyncReqwestClient, UrlTemplateProvider};
//! use geomosaic::request::DownloadRequest;
//!
//! let config = DownloadConfig::default();
//! let provider = Arc::new(UrlTemplateProvider::new(template, ["LANDSAT_8"]));
//! let http = Arc::new(AsyncReqwestClient::new()?);
//! let fetcher = Arc::new(ProviderTileFetcher::new(provider, http, config.request_timeout()));
//!
//! let manager = DownloadManager::new(fetcher, GeoTiffCodec::new(), config);
//! let report = manager.run(request).await?;
//! ```

pub mod config;
pub mod download;
pub mod fetch;
pub mod geo;
pub mod logging;
pub mod mosaic;
pub mod progress;
pub mod provider;
pub mod request;
pub mod scheduler;
pub mod tiler;

/// Version of the geomosaic library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
