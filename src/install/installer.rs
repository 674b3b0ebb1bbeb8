use super::metadata::read_metadata;
use super::package::{PackageSource, sanitize_file_name};
use crate::catalog::DriverCatalog;
use crate::config::{Config, FileCollisionAction};
use crate::error::{Error, InstallError, Result};
use crate::types::{DriverMetadata, DriverScope, Event, InstalledDriver};
use crate::utils::{copy_buffered, get_unique_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tracing::{debug, info, warn};

/// Validates driver packages and registers them in the catalog
///
/// A package is first copied into a hidden file in driver storage and
/// validated there. It only receives its final name once its metadata has
/// passed the duplicate check, so a rejected package never leaves a file
/// behind. The duplicate check and the registration run under one lock.
pub struct DriverInstaller {
    driver_dir: PathBuf,
    descriptor_name: String,
    require_library_entry: bool,
    file_collision: FileCollisionAction,
    buffer_size: usize,
    catalog: Arc<DriverCatalog>,
    event_tx: broadcast::Sender<Event>,
    gate: Mutex<()>,
}

/// A package copied into storage and validated, not yet promoted
struct StagedPackage {
    file: NamedTempFile,
    metadata: DriverMetadata,
}

impl DriverInstaller {
    /// Build an installer writing into the configured driver directory
    pub fn new(
        config: &Config,
        catalog: Arc<DriverCatalog>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            driver_dir: config.driver_dir(),
            descriptor_name: config.install.descriptor_name.clone(),
            require_library_entry: config.install.require_library_entry,
            file_collision: config.install.file_collision,
            buffer_size: config.materialize.buffer_size,
            catalog,
            event_tx,
            gate: Mutex::new(()),
        }
    }

    /// Driver storage directory
    pub fn driver_dir(&self) -> &Path {
        &self.driver_dir
    }

    /// Exclusive access to driver storage
    ///
    /// Installs commit (dedup, persist, register) while holding this lock;
    /// catalog rescans and removals take it too so they never observe a
    /// persisted package that is not registered yet.
    pub(crate) async fn storage_lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Install a package and select it for `scope`
    ///
    /// On failure a [`Event::DriverRejected`] carries the fixed user-facing
    /// message; the returned error keeps the underlying cause.
    pub async fn install(&self, source: PackageSource, scope: DriverScope) -> Result<InstalledDriver> {
        let offered_name = source.file_name().to_string();
        match self.install_inner(source, scope).await {
            Ok(driver) => Ok(driver),
            Err(e) => {
                warn!(
                    file_name = %offered_name,
                    code = e.error_code(),
                    error = %e,
                    "driver package rejected"
                );
                self.emit_event(Event::DriverRejected {
                    file_name: offered_name,
                    code: e.error_code().to_string(),
                    message: e.user_message().to_string(),
                });
                Err(e)
            }
        }
    }

    async fn install_inner(&self, source: PackageSource, scope: DriverScope) -> Result<InstalledDriver> {
        let file_name = sanitize_file_name(source.file_name())?;
        info!(file_name = %file_name, %scope, "installing driver package");
        self.emit_event(Event::InstallStarted {
            file_name: file_name.clone(),
        });

        let target = self.driver_dir.join(&file_name);
        let staged = {
            let driver_dir = self.driver_dir.clone();
            let descriptor = self.descriptor_name.clone();
            let require_library = self.require_library_entry;
            let buffer_size = self.buffer_size;
            let staging_target = target.clone();
            tokio::task::spawn_blocking(move || {
                stage_package(
                    source,
                    &driver_dir,
                    &staging_target,
                    &descriptor,
                    require_library,
                    buffer_size,
                )
            })
            .await
            .map_err(|e| {
                Error::Install(InstallError::CopyFailed {
                    path: target.clone(),
                    reason: format!("install task panicked: {}", e),
                })
            })??
        };

        let _guard = self.storage_lock().await;

        if let Some(existing) = self.catalog.find_by_metadata(&staged.metadata).await {
            // Dropping the staged file deletes it
            return Err(Error::Install(InstallError::AlreadyInstalled {
                name: staged.metadata.name.clone(),
                existing: existing.path,
            }));
        }

        let final_path = get_unique_path(&target, self.file_collision)?;
        if final_path != target {
            debug!(requested = ?target, actual = ?final_path, "renamed to avoid collision");
        }

        let StagedPackage { file, metadata } = staged;
        let persisted = if self.file_collision == FileCollisionAction::Overwrite {
            file.persist(&final_path)
        } else {
            file.persist_noclobber(&final_path)
        };
        persisted.map_err(|e| {
            Error::Install(InstallError::CopyFailed {
                path: final_path.clone(),
                reason: e.error.to_string(),
            })
        })?;

        // Unlist the replaced driver only once its file has been replaced
        if self.file_collision == FileCollisionAction::Overwrite
            && let Some((replaced, cleared)) = self.catalog.remove(&final_path).await
        {
            info!(path = ?replaced.path, "replacing installed driver");
            self.emit_event(Event::DriverRemoved {
                path: replaced.path,
            });
            for scope in cleared {
                self.emit_event(Event::DriverSelected { scope, path: None });
            }
        }

        let driver = InstalledDriver {
            path: final_path.clone(),
            metadata,
        };
        if let Err(e) = self.catalog.register(driver.clone()).await {
            // Never leave a file the catalog does not list
            std::fs::remove_file(&final_path).ok();
            return Err(e);
        }
        self.catalog.select(scope.clone(), &final_path).await?;

        info!(path = ?driver.path, driver = %driver.metadata, %scope, "driver installed");
        self.emit_event(Event::DriverInstalled {
            path: driver.path.clone(),
            metadata: driver.metadata.clone(),
            scope: scope.clone(),
        });
        self.emit_event(Event::DriverSelected {
            scope,
            path: Some(driver.path.clone()),
        });

        Ok(driver)
    }
}

/// Copy `source` into a hidden file in `driver_dir` and validate it
fn stage_package(
    source: PackageSource,
    driver_dir: &Path,
    target: &Path,
    descriptor: &str,
    require_library: bool,
    buffer_size: usize,
) -> Result<StagedPackage> {
    let copy_failed = |e: std::io::Error| {
        Error::Install(InstallError::CopyFailed {
            path: target.to_path_buf(),
            reason: e.to_string(),
        })
    };

    std::fs::create_dir_all(driver_dir).map_err(copy_failed)?;
    let mut file = tempfile::Builder::new()
        .prefix(".install-")
        .suffix(".part")
        .tempfile_in(driver_dir)
        .map_err(copy_failed)?;

    let mut reader = source.into_reader();
    let bytes = copy_buffered(&mut reader, file.as_file_mut(), buffer_size).map_err(copy_failed)?;
    debug!(?target, bytes, "package copied into driver storage");

    let metadata = read_metadata(file.as_file(), target, descriptor, require_library)?;
    Ok(StagedPackage { file, metadata })
}
