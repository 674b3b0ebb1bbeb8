//! Driver package download transport
//!
//! [`Fetcher`] turns a URL into a local temporary file that the installer
//! can consume like any user-picked package. [`HttpFetcher`] is the
//! production implementation; tests and embedders can supply their own.

mod http;

pub use http::HttpFetcher;

use crate::error::Result;
use crate::install::PackageSource;
use async_trait::async_trait;
use std::io::{Seek, SeekFrom};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Progress callback: bytes received so far and the declared total
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// What to download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Package URL
    pub url: String,
    /// File name to install under; derived from the response when `None`
    pub file_name: Option<String>,
}

impl FetchRequest {
    /// Request `url`, naming the file after the response
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: None,
        }
    }

    /// Override the stored file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// A completed download held in a temporary file
///
/// The file is deleted when this value, or the [`PackageSource`] made from
/// it, is dropped.
#[derive(Debug)]
pub struct FetchedPackage {
    /// Downloaded bytes
    pub file: NamedTempFile,
    /// Name the package should be installed under
    pub file_name: String,
    /// Number of bytes received
    pub bytes: u64,
}

impl FetchedPackage {
    /// Turn the download into an installer byte source
    pub fn into_source(mut self) -> Result<PackageSource> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(PackageSource::from_reader(self.file, self.file_name).with_total_bytes(self.bytes))
    }
}

/// Asynchronous download transport
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `request` into a temporary file
    ///
    /// Must stop promptly once `cancel` fires, returning
    /// [`crate::error::DownloadError::Cancelled`] and leaving no partial
    /// file behind. `progress` is called as data arrives.
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: CancellationToken,
        progress: &ProgressFn<'_>,
    ) -> Result<FetchedPackage>;
}
