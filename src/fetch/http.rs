use super::{FetchRequest, FetchedPackage, Fetcher, ProgressFn};
use crate::error::{DownloadError, Error, Result};
use crate::utils::extract_filename_from_response;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// [`Fetcher`] over HTTP(S) using `reqwest`
///
/// Bodies are streamed chunk by chunk into a hidden file under `temp_dir`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    temp_dir: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher with a whole-request `timeout`
    pub fn new(timeout: Duration, temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to create HTTP client: {}",
                    e
                )))
            })?;
        Ok(Self::with_client(client, temp_dir))
    }

    /// Use a preconfigured client
    pub fn with_client(client: reqwest::Client, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            temp_dir: temp_dir.into(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: CancellationToken,
        progress: &ProgressFn<'_>,
    ) -> Result<FetchedPackage> {
        let url = request.url.as_str();
        let cancelled = || {
            Error::Download(DownloadError::Cancelled {
                url: url.to_string(),
            })
        };

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            response = self.client.get(url).send() => response?,
        };

        if !response.status().is_success() {
            return Err(Error::Download(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            }));
        }

        let file_name = match &request.file_name {
            Some(name) => name.clone(),
            None => extract_filename_from_response(&response, url),
        };
        let total = response.content_length();
        debug!(url, file_name = %file_name, ?total, "receiving driver package");

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&self.temp_dir)?;
        let mut out = tokio::fs::File::from_std(temp.reopen()?);

        // `temp` is dropped on every early return, deleting the partial file
        let mut received = 0u64;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else { break };
            out.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(received, total);
        }
        out.flush().await?;
        drop(out);

        if let Some(expected) = total
            && received < expected
        {
            return Err(Error::Download(DownloadError::Incomplete {
                url: url.to_string(),
                expected,
                received,
            }));
        }

        info!(url, file_name = %file_name, bytes = received, "driver package downloaded");
        Ok(FetchedPackage {
            file: temp,
            file_name,
            bytes: received,
        })
    }
}
