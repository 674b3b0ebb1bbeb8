//! Removing drivers and per-scope driver selection

use super::DriverDepot;
use crate::error::{Error, Result};
use crate::types::{DriverScope, Event, InstalledDriver};
use std::path::Path;

impl DriverDepot {
    /// Delete an installed driver's file and catalog entry
    ///
    /// Scopes that had it selected fall back to their default.
    pub async fn remove(&self, path: &Path) -> Result<InstalledDriver> {
        let _storage = self.installer.storage_lock().await;
        if self.catalog.get(path).await.is_none() {
            return Err(Error::NotFound(format!(
                "no installed driver at {}",
                path.display()
            )));
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "driver file already gone");
            }
            Err(e) => return Err(e.into()),
        }

        let (removed, cleared) = self
            .catalog
            .remove(path)
            .await
            .ok_or_else(|| Error::NotFound(format!("no installed driver at {}", path.display())))?;

        tracing::info!(path = ?removed.path, driver = %removed.metadata, "driver removed");
        self.emit_event(Event::DriverRemoved {
            path: removed.path.clone(),
        });
        for scope in cleared {
            self.emit_event(Event::DriverSelected { scope, path: None });
        }

        Ok(removed)
    }

    /// Select an installed driver for `scope`
    pub async fn select(&self, scope: DriverScope, path: &Path) -> Result<()> {
        self.catalog.select(scope.clone(), path).await?;
        tracing::debug!(%scope, ?path, "driver selected");
        self.emit_event(Event::DriverSelected {
            scope,
            path: Some(path.to_path_buf()),
        });
        Ok(())
    }

    /// Drop the selection for `scope`
    ///
    /// Returns whether a selection existed.
    pub async fn clear_selection(&self, scope: &DriverScope) -> bool {
        let cleared = self.catalog.clear_selection(scope).await;
        if cleared {
            self.emit_event(Event::DriverSelected {
                scope: scope.clone(),
                path: None,
            });
        }
        cleared
    }

    /// Driver in effect for `scope`, `None` for the system driver
    pub async fn selected(&self, scope: &DriverScope) -> Option<InstalledDriver> {
        self.catalog.selected(scope).await
    }
}
