//! HTTP client abstraction for testability

use super::types::ProviderError;
use futures::StreamExt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

/// Default per-request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default User-Agent string for HTTP requests.
const DEFAULT_USER_AGENT: &str = concat!("geomosaic/", env!("CARGO_PKG_VERSION"));

/// Trait for asynchronous HTTP client operations.
///
/// Allows the tile fetcher to be exercised with a mock client in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Streams the body of a GET request into `path`.
    ///
    /// Parent directories are created as needed and an existing file is
    /// truncated. Returns the number of bytes written.
    fn download_to_file(
        &self,
        url: &str,
        path: &Path,
    ) -> impl Future<Output = Result<u64, ProviderError>> + Send;
}

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a new AsyncReqwestClient with default configuration.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new AsyncReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(30)))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("Failed to create async HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        trace!(url = url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                if e.is_timeout() {
                    return Err(ProviderError::Timeout(format!("GET {}", url)));
                }
                return Err(ProviderError::HttpError(format!("Request failed: {}", e)));
            }
        };

        // Check HTTP status
        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "HTTP error status"
            );
            return Err(ProviderError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn download_to_file(&self, url: &str, path: &Path) -> Result<u64, ProviderError> {
        let response = self.send(url).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| {
                warn!(url = url, error = %e, "Response stream interrupted");
                if e.is_timeout() {
                    ProviderError::Timeout(format!("reading body of {}", url))
                } else {
                    ProviderError::HttpError(format!("Failed to read response: {}", e))
                }
            })?;
            file.write_all(&bytes).await?;
            written += bytes.len() as u64;
        }
        file.flush().await?;

        trace!(url = url, path = %path.display(), bytes = written, "Response streamed to file");
        Ok(written)
    }
}
