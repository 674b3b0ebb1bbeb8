//! In-memory catalog of installed drivers and per-scope selections
//!
//! The catalog is the single owner of the installed-driver list. Readers
//! take snapshots; only the installer and the depot mutate it. Two entries
//! never carry structurally equal [`DriverMetadata`].

use crate::error::{Error, InstallError, Result};
use crate::install::read_package_metadata;
use crate::types::{DriverMetadata, DriverScope, InstalledDriver};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CatalogState {
    drivers: Vec<InstalledDriver>,
    selections: HashMap<DriverScope, PathBuf>,
}

/// Installed drivers in insertion order, plus the selected driver per scope
#[derive(Debug, Default)]
pub struct DriverCatalog {
    state: RwLock<CatalogState>,
}

impl DriverCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the archives already in `dir`
    pub async fn scan(dir: &Path, descriptor: &str, require_library: bool) -> Result<Self> {
        let catalog = Self::new();
        catalog.rescan(dir, descriptor, require_library).await?;
        Ok(catalog)
    }

    /// Register archives in `dir` that the catalog does not know yet
    ///
    /// Files are visited in name order. Hidden files, unreadable archives
    /// and duplicates of an already registered driver are skipped. Returns
    /// the newly registered drivers.
    pub async fn rescan(
        &self,
        dir: &Path,
        descriptor: &str,
        require_library: bool,
    ) -> Result<Vec<InstalledDriver>> {
        let dir_owned = dir.to_path_buf();
        let descriptor = descriptor.to_string();
        let candidates = tokio::task::spawn_blocking(move || {
            read_candidates(&dir_owned, &descriptor, require_library)
        })
        .await
        .map_err(|e| Error::Other(format!("catalog scan task panicked: {}", e)))??;

        let mut state = self.state.write().await;
        let mut discovered = Vec::new();
        for driver in candidates {
            // Already known, or deleted since it was read
            if state.drivers.iter().any(|d| d.path == driver.path) || !driver.path.is_file() {
                continue;
            }
            if let Some(existing) = state.drivers.iter().find(|d| d.metadata == driver.metadata) {
                debug!(
                    path = ?driver.path,
                    existing = ?existing.path,
                    "skipping duplicate driver package"
                );
                continue;
            }
            state.drivers.push(driver.clone());
            discovered.push(driver);
        }

        debug!(dir = ?dir, discovered = discovered.len(), total = state.drivers.len(), "catalog scanned");
        Ok(discovered)
    }

    /// Copy of every entry, in insertion order
    pub async fn snapshot(&self) -> Vec<InstalledDriver> {
        self.state.read().await.drivers.clone()
    }

    /// Number of installed drivers
    pub async fn len(&self) -> usize {
        self.state.read().await.drivers.len()
    }

    /// Whether no driver is installed
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.drivers.is_empty()
    }

    /// Entry whose metadata is structurally equal to `metadata`
    pub async fn find_by_metadata(&self, metadata: &DriverMetadata) -> Option<InstalledDriver> {
        self.state
            .read()
            .await
            .drivers
            .iter()
            .find(|d| &d.metadata == metadata)
            .cloned()
    }

    /// Entry backed by `path`
    pub async fn get(&self, path: &Path) -> Option<InstalledDriver> {
        self.state
            .read()
            .await
            .drivers
            .iter()
            .find(|d| d.path == path)
            .cloned()
    }

    /// Append a driver
    ///
    /// Refused with [`InstallError::AlreadyInstalled`] when an entry with
    /// equal metadata exists.
    pub(crate) async fn register(&self, driver: InstalledDriver) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.drivers.iter().find(|d| d.metadata == driver.metadata) {
            return Err(Error::Install(InstallError::AlreadyInstalled {
                name: driver.metadata.name.clone(),
                existing: existing.path.clone(),
            }));
        }
        state.drivers.push(driver);
        Ok(())
    }

    /// Drop the entry backed by `path`
    ///
    /// Selections pointing at it are cleared; the affected scopes are
    /// returned alongside the removed entry.
    pub(crate) async fn remove(&self, path: &Path) -> Option<(InstalledDriver, Vec<DriverScope>)> {
        let mut state = self.state.write().await;
        let index = state.drivers.iter().position(|d| d.path == path)?;
        let removed = state.drivers.remove(index);

        let cleared: Vec<DriverScope> = state
            .selections
            .iter()
            .filter(|(_, selected)| selected.as_path() == path)
            .map(|(scope, _)| scope.clone())
            .collect();
        for scope in &cleared {
            state.selections.remove(scope);
        }

        Some((removed, cleared))
    }

    /// Select the installed driver at `path` for `scope`
    pub async fn select(&self, scope: DriverScope, path: &Path) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.drivers.iter().any(|d| d.path == path) {
            return Err(Error::NotFound(format!(
                "no installed driver at {}",
                path.display()
            )));
        }
        state.selections.insert(scope, path.to_path_buf());
        Ok(())
    }

    /// Remove the selection for `scope`, returning whether one existed
    ///
    /// A cleared title scope falls back to the global selection.
    pub async fn clear_selection(&self, scope: &DriverScope) -> bool {
        self.state.write().await.selections.remove(scope).is_some()
    }

    /// Driver in effect for `scope`
    ///
    /// A title without its own selection uses the global one. `None` means
    /// the system driver.
    pub async fn selected(&self, scope: &DriverScope) -> Option<InstalledDriver> {
        let state = self.state.read().await;
        let path = match state.selections.get(scope) {
            Some(path) => Some(path),
            None if matches!(scope, DriverScope::Title(_)) => {
                state.selections.get(&DriverScope::Global)
            }
            None => None,
        }?;
        state.drivers.iter().find(|d| &d.path == path).cloned()
    }

    /// Whether `scope` has a selection of its own rather than a fallback
    pub async fn has_own_selection(&self, scope: &DriverScope) -> bool {
        self.state.read().await.selections.contains_key(scope)
    }
}

fn read_candidates(
    dir: &Path,
    descriptor: &str,
    require_library: bool,
) -> Result<Vec<InstalledDriver>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut drivers = Vec::new();
    for path in paths {
        match read_package_metadata(&path, descriptor, require_library) {
            Ok(metadata) => drivers.push(InstalledDriver { path, metadata }),
            Err(e) => warn!(?path, error = %e, "skipping unreadable driver package"),
        }
    }
    Ok(drivers)
}
