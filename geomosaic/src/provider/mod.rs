//! Imagery provider abstraction
//!
//! The core never talks to a specific imagery platform. It asks an
//! [`ImageryProvider`] for a rendered image over a rectangle and for a
//! short-lived download URL, then retrieves the bytes through an
//! [`AsyncHttpClient`].
//!
//! # Example
//!
//! ```ignore
//! use geomosaic::provider::{AsyncReqwestClient, UrlTemplateProvider};
//!
//! let http = AsyncReqwestClient::new()?;
//! let provider = UrlTemplateProvider::new(
//!     "https://imagery.example.com/wcs?coverage={sensor}&bbox={west},{south},{east},{north}&res={scale}",
//!     ["LANDSAT_8", "SENTINEL_2"],
//! );
//! ```

mod http;
mod template;
mod types;

pub use http::{AsyncHttpClient, AsyncReqwestClient};
pub use template::UrlTemplateProvider;
pub use types::{ImageQuery, ImageRef, ImageryProvider, ProviderError};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
