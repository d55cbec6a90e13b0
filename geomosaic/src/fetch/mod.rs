//! Tile acquisition.
//!
//! [`TileFetcher`] performs a single attempt to download one tile;
//! [`RetryPolicy`] wraps it with bounded attempts, backoff, file validation
//! and cancellation, and reduces the outcome to a [`TileResult`].

mod fetcher;
mod retry;

pub use fetcher::{FetchError, FetchedTile, ProviderTileFetcher, TileFetcher, GEOTIFF_FORMAT};
pub use retry::{validate_tile_file, RetryPolicy, TileResult, TileValidationError, CANCELLED_MESSAGE};
