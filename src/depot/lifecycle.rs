//! Startup scan, background materialization and shutdown

use super::DriverDepot;
use crate::error::Result;
use crate::materialize::{MaterializeHandle, MaterializeReport, Materializer};
use crate::types::{Event, InstalledDriver};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

impl DriverDepot {
    /// Materialize bundled assets in the background
    ///
    /// Returns immediately. Wait on the handle before reading materialized
    /// paths; it completes after bundled driver packages have been added to
    /// the catalog.
    pub fn start_materialization(&self) -> Result<MaterializeHandle> {
        self.ensure_accepting()?;

        let (tx, handle) = MaterializeHandle::pending();
        let depot = self.clone();
        tokio::spawn(async move {
            match depot.materialize_all().await {
                Ok(report) => {
                    tx.send(Some(Arc::new(report))).ok();
                }
                Err(e) => {
                    // Dropping `tx` fails every waiter
                    tracing::error!(error = %e, "background materialization failed");
                }
            }
        });

        Ok(handle)
    }

    /// Materialize bundled assets and wait for the result
    pub async fn materialize_all(&self) -> Result<MaterializeReport> {
        let materializer =
            Materializer::new(&self.config, self.bundle.clone(), self.event_tx.clone());
        let report = materializer.run().await?;

        if let Err(e) = self.refresh_catalog().await {
            tracing::warn!(error = %e, "failed to rescan driver storage after materialization");
        }

        Ok(report)
    }

    /// Register driver packages that appeared in storage
    ///
    /// Emits [`Event::DriverDiscovered`] for each new entry.
    pub async fn refresh_catalog(&self) -> Result<Vec<InstalledDriver>> {
        let _storage = self.installer.storage_lock().await;
        let discovered = self
            .catalog
            .rescan(
                &self.config.driver_dir(),
                &self.config.install.descriptor_name,
                self.config.install.require_library_entry,
            )
            .await?;

        for driver in &discovered {
            tracing::info!(path = ?driver.path, driver = %driver.metadata, "discovered driver package");
            self.emit_event(Event::DriverDiscovered {
                path: driver.path.clone(),
                metadata: driver.metadata.clone(),
            });
        }

        Ok(discovered)
    }

    /// Token for one download, cancelled when the depot shuts down
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    /// Whether [`Self::shutdown`] has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.accepting_new.load(Ordering::SeqCst)
    }

    /// Stop accepting work and cancel every in-flight download
    ///
    /// Partial downloads are deleted. Installs already past the download
    /// stage run to completion.
    pub fn shutdown(&self) {
        tracing::info!("Initiating shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown_token.cancel();
        tracing::info!("Cancelled in-flight downloads");
    }
}
