//! Download orchestration.
//!
//! [`DownloadManager`] turns a [`DownloadRequest`](crate::request::DownloadRequest)
//! into a mosaic:
//!
//! 1. validate the request (synchronously, in [`DownloadManager::submit`])
//! 2. split the area into tiles
//! 3. fetch tiles through the worker pool, reporting progress
//! 4. merge the successful tiles in tile index order
//!
//! Only one operation runs per manager; a second submit while one is active
//! is rejected with [`DownloadError::Busy`].

mod error;
mod manager;
mod report;

pub use error::DownloadError;
pub use manager::DownloadManager;
pub use report::DownloadReport;
