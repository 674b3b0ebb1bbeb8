//! Installing driver packages from files, streams, URLs and known releases

use super::DriverDepot;
use crate::config::DriverRelease;
use crate::error::{DownloadError, Error, Result};
use crate::fetch::FetchRequest;
use crate::install::PackageSource;
use crate::types::{DriverScope, Event, InstalledDriver};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Progress events for downloads of unknown size are sent once per this many bytes
const PROGRESS_STEP_BYTES: u64 = 256 * 1024;

impl DriverDepot {
    /// Install a package from any byte source and select it for `scope`
    ///
    /// # Example
    /// ```no_run
    /// use driver_depot::{Config, DriverDepot, DriverScope, PackageSource};
    ///
    /// # async fn example() -> driver_depot::Result<()> {
    /// let depot = DriverDepot::new(Config::default()).await?;
    /// let bytes = std::fs::read("Turnip-24.1.0.adpkg_R18.zip")?;
    /// let source = PackageSource::from_reader(std::io::Cursor::new(bytes), "Turnip-24.1.0.adpkg_R18.zip");
    /// match depot.install(source, DriverScope::Global).await {
    ///     Ok(driver) => println!("installed {}", driver.metadata),
    ///     Err(e) => println!("{}", e.user_message()),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn install(&self, source: PackageSource, scope: DriverScope) -> Result<InstalledDriver> {
        self.ensure_accepting()?;
        self.installer.install(source, scope).await
    }

    /// Install a package file picked by the user
    pub async fn install_file(&self, path: &Path, scope: DriverScope) -> Result<InstalledDriver> {
        self.ensure_accepting()?;
        let source = match PackageSource::from_path(path) {
            Ok(source) => source,
            Err(e) => {
                self.reject(&path.display().to_string(), &e);
                return Err(e);
            }
        };
        self.installer.install(source, scope).await
    }

    /// Download a package and install it
    ///
    /// `file_name` overrides the name derived from the response. The
    /// download stops when `cancel` fires or the depot shuts down; the
    /// partial file is deleted either way.
    pub async fn install_from_url(
        &self,
        url: &str,
        file_name: Option<&str>,
        scope: DriverScope,
        cancel: &CancellationToken,
    ) -> Result<InstalledDriver> {
        self.ensure_accepting()?;

        let mut request = FetchRequest::new(url);
        if let Some(name) = file_name {
            request = request.with_file_name(name);
        }

        tracing::info!(url, "downloading driver package");
        self.emit_event(Event::DownloadStarted {
            url: url.to_string(),
        });

        let progress = self.progress_reporter(url);
        let fetched = tokio::select! {
            biased;
            _ = self.shutdown_token.cancelled() => Err(Error::Download(DownloadError::Cancelled {
                url: url.to_string(),
            })),
            result = self.fetcher.fetch(&request, cancel.clone(), &progress) => result,
        };

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(url, error = %e, "driver download failed");
                self.emit_event(Event::DownloadFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                self.reject(file_name.unwrap_or(url), &e);
                return Err(e);
            }
        };

        self.emit_event(Event::DownloadComplete {
            url: url.to_string(),
            file_name: fetched.file_name.clone(),
            bytes: fetched.bytes,
        });

        let source = fetched.into_source()?;
        self.installer.install(source, scope).await
    }

    /// Downloadable driver releases from the configuration
    pub fn releases(&self) -> &[DriverRelease] {
        &self.config.download.releases
    }

    /// Download and install a known release by name
    pub async fn install_release(
        &self,
        name: &str,
        scope: DriverScope,
        cancel: &CancellationToken,
    ) -> Result<InstalledDriver> {
        let release = self
            .config
            .release(name)
            .cloned()
            .ok_or_else(|| Error::Download(DownloadError::UnknownRelease(name.to_string())))?;
        self.install_from_url(&release.url, Some(&release.file_name), scope, cancel)
            .await
    }

    fn reject(&self, file_name: &str, error: &Error) {
        self.emit_event(Event::DriverRejected {
            file_name: file_name.to_string(),
            code: error.error_code().to_string(),
            message: error.user_message().to_string(),
        });
    }

    /// Progress callback sending [`Event::DownloadProgress`]
    ///
    /// Sends at most one event per whole percent, or per
    /// [`PROGRESS_STEP_BYTES`] when the size is unknown.
    fn progress_reporter(&self, url: &str) -> impl Fn(u64, Option<u64>) + Send + Sync + 'static {
        let event_tx = self.event_tx.clone();
        let url = url.to_string();
        let last_marker = AtomicU64::new(u64::MAX);

        move |received, total| {
            let (marker, percent) = match total {
                Some(total) if total > 0 => {
                    let percent = (received as f64 / total as f64 * 100.0).min(100.0);
                    (percent as u64, Some(percent as f32))
                }
                _ => (received / PROGRESS_STEP_BYTES, None),
            };
            if last_marker.swap(marker, Ordering::Relaxed) != marker {
                event_tx
                    .send(Event::DownloadProgress {
                        url: url.clone(),
                        received,
                        total,
                        percent,
                    })
                    .ok();
            }
        }
    }
}
