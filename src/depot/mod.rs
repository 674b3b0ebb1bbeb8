//! The `DriverDepot` facade, split into focused submodules:
//! - [`lifecycle`] - Startup scan, background materialization and shutdown
//! - [`packages`] - Installing from files, streams, URLs and known releases
//! - [`selection`] - Removing drivers and per-scope driver selection

mod lifecycle;
mod packages;
mod selection;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::catalog::DriverCatalog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::install::DriverInstaller;
use crate::materialize::{ArchiveBundle, Bundle, DirectoryBundle};
use crate::types::Event;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Asset materializer, driver installer and driver catalog behind one handle
///
/// Cloneable; all clones share the same catalog, event channel and shutdown
/// state.
#[derive(Clone)]
pub struct DriverDepot {
    /// Validated configuration
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Installed drivers and selections
    pub(crate) catalog: Arc<DriverCatalog>,
    /// Package validation and registration
    pub(crate) installer: Arc<DriverInstaller>,
    /// Read-only application bundle
    pub(crate) bundle: Arc<dyn Bundle>,
    /// Download transport
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Parent of every download token; cancelled on shutdown
    pub(crate) shutdown_token: CancellationToken,
    /// Cleared on shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl DriverDepot {
    /// Create a depot from `config`
    ///
    /// Opens the bundle (a directory, or a package file read in place),
    /// creates driver storage and registers the packages already in it.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let bundle = open_bundle(&config.storage.bundle_path)?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
            config.download.timeout,
            config.storage.temp_dir.clone(),
        )?);
        Self::with_components(config, bundle, fetcher).await
    }

    /// Create a depot with a custom bundle and download transport
    pub async fn with_components(
        config: Config,
        bundle: Arc<dyn Bundle>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(config.driver_dir()).await?;

        let (event_tx, _) = broadcast::channel(config.download.event_capacity);
        let catalog = Arc::new(DriverCatalog::new());
        let installer = Arc::new(DriverInstaller::new(
            &config,
            catalog.clone(),
            event_tx.clone(),
        ));

        let depot = Self {
            config: Arc::new(config),
            event_tx,
            catalog,
            installer,
            bundle,
            fetcher,
            shutdown_token: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        let found = depot.refresh_catalog().await?;
        tracing::info!(
            drivers = found.len(),
            driver_dir = ?depot.config.driver_dir(),
            "driver depot ready"
        );
        Ok(depot)
    }

    /// Subscribe to events
    ///
    /// Receivers that fall behind by more than the configured capacity miss
    /// the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Shared driver catalog
    pub fn catalog(&self) -> &Arc<DriverCatalog> {
        &self.catalog
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}

/// Open the bundle at `path`
///
/// A directory is used as-is. An `.apk` file exposes its `assets/` entries;
/// any other file is read as a ZIP from its root.
fn open_bundle(path: &Path) -> Result<Arc<dyn Bundle>> {
    if path.is_dir() {
        return Ok(Arc::new(DirectoryBundle::new(path)));
    }
    if !path.is_file() {
        return Err(Error::Config {
            message: format!("bundle {} does not exist", path.display()),
            key: Some("bundle_path".to_string()),
        });
    }

    let is_apk = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("apk"));
    let prefix = if is_apk { "assets" } else { "" };
    Ok(Arc::new(ArchiveBundle::from_package(path, prefix)?))
}
