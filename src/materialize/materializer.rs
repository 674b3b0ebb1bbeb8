use super::bundle::Bundle;
use super::copy::{FileCopy, copy_asset_tree, copy_single_asset};
use super::zip::copy_zip_asset;
use crate::config::{AssetKind, AssetSpec, Config};
use crate::error::{Error, MaterializeError, Result};
use crate::types::Event;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// How one planned asset ended up
#[derive(Debug)]
pub enum AssetOutcome {
    /// Copied in this run
    Materialized {
        /// Files written
        files: usize,
        /// Archive entries refused by the containment guard
        rejected_entries: Vec<String>,
    },
    /// Destination already existed, nothing was written
    AlreadyPresent,
    /// The asset could not be materialized; other assets were unaffected
    Failed(Error),
}

/// Outcome of one planned asset
#[derive(Debug)]
pub struct AssetReport {
    /// Bundle-relative asset name
    pub source: String,
    /// Destination file or root
    pub destination: PathBuf,
    /// What happened
    pub outcome: AssetOutcome,
}

/// Result of a materialization run, one entry per planned asset in plan order
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Per-asset outcomes
    pub outcomes: Vec<AssetReport>,
}

impl MaterializeReport {
    /// Assets copied in this run
    pub fn materialized(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::Materialized { .. }))
    }

    /// Assets left alone because their destination existed
    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::AlreadyPresent))
    }

    /// Assets that failed
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::Failed(_)))
    }

    /// Every archive entry refused across the run
    pub fn rejected_entries(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .flat_map(|r| match &r.outcome {
                AssetOutcome::Materialized {
                    rejected_entries, ..
                } => rejected_entries.iter().map(String::as_str).collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Outcome for one asset
    pub fn outcome(&self, source: &str) -> Option<&AssetOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.outcome)
    }

    /// No asset failed
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&AssetOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Copies the configured bundle assets into writable storage
///
/// The existence of a destination is the only record that an asset was
/// materialized. Folder and archive assets are assembled in a hidden staging
/// directory beside their destination and renamed into place, so an
/// interrupted run never leaves a half-written root that later runs would
/// mistake for a finished one.
#[derive(Clone)]
pub struct Materializer {
    bundle: Arc<dyn Bundle>,
    data_dir: PathBuf,
    keys_dir: PathBuf,
    key_file: Option<String>,
    assets: Vec<(AssetSpec, PathBuf)>,
    buffer_size: usize,
    event_tx: broadcast::Sender<Event>,
}

impl Materializer {
    /// Build a materializer for the plan in `config`
    pub fn new(config: &Config, bundle: Arc<dyn Bundle>, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            bundle,
            data_dir: config.storage.data_dir.clone(),
            keys_dir: config.keys_dir(),
            key_file: config.materialize.key_file.clone(),
            assets: config
                .materialize
                .assets
                .iter()
                .map(|asset| (asset.clone(), config.asset_destination(asset)))
                .collect(),
            buffer_size: config.materialize.buffer_size,
            event_tx,
        }
    }

    fn emit_event(&self, event: Event) {
        // No receivers is fine
        self.event_tx.send(event).ok();
    }

    /// Materialize every planned asset, blocking the calling thread
    ///
    /// The key file goes first, then the configured assets in order. A
    /// failing asset is recorded in the report and the run continues.
    pub fn materialize_all(&self) -> MaterializeReport {
        let planned = self.assets.len() + usize::from(self.key_file.is_some());
        info!(assets = planned, data_dir = ?self.data_dir, "materializing bundle assets");
        self.emit_event(Event::MaterializeStarted { assets: planned });

        let mut report = MaterializeReport::default();

        if let Some(key_file) = &self.key_file {
            let file_name = key_file.rsplit('/').next().unwrap_or_default();
            let destination = self.keys_dir.join(file_name);
            let outcome = if matches!(file_name, "" | "." | "..") {
                AssetOutcome::Failed(Error::Materialize(MaterializeError::InvalidAssetPath {
                    asset: key_file.clone(),
                    reason: "key file has no file name".to_string(),
                }))
            } else {
                self.copy_file(key_file, &self.keys_dir, file_name)
            };
            self.record(&mut report, key_file, destination, outcome);
        }

        for (asset, destination) in &self.assets {
            let destination = destination.clone();
            let outcome = match asset.kind {
                AssetKind::File => match (destination.parent(), destination.file_name()) {
                    (Some(dir), Some(name)) => {
                        self.copy_file(&asset.source, dir, &name.to_string_lossy())
                    }
                    _ => AssetOutcome::Failed(Error::Materialize(
                        MaterializeError::InvalidAssetPath {
                            asset: asset.source.clone(),
                            reason: "destination has no file name".to_string(),
                        },
                    )),
                },
                AssetKind::Tree | AssetKind::Zip => self.copy_rooted(asset, &destination),
            };
            self.record(&mut report, &asset.source, destination, outcome);
        }

        info!(
            materialized = report.materialized(),
            skipped = report.already_present(),
            failed = report.failed(),
            "bundle materialization finished"
        );
        self.emit_event(Event::MaterializeComplete {
            materialized: report.materialized(),
            skipped: report.already_present(),
            failed: report.failed(),
        });

        report
    }

    /// Run [`Self::materialize_all`] on the blocking pool
    pub async fn run(&self) -> Result<MaterializeReport> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.materialize_all())
            .await
            .map_err(|e| {
                Error::Materialize(MaterializeError::TaskFailed(format!(
                    "materialization task panicked: {}",
                    e
                )))
            })
    }

    fn copy_file(&self, source: &str, dest_dir: &Path, file_name: &str) -> AssetOutcome {
        match copy_single_asset(
            self.bundle.as_ref(),
            source,
            dest_dir,
            file_name,
            self.buffer_size,
        ) {
            Ok(FileCopy::Copied { .. }) => AssetOutcome::Materialized {
                files: 1,
                rejected_entries: Vec::new(),
            },
            Ok(FileCopy::AlreadyPresent) => AssetOutcome::AlreadyPresent,
            Err(e) => AssetOutcome::Failed(e),
        }
    }

    fn copy_rooted(&self, asset: &AssetSpec, root: &Path) -> AssetOutcome {
        if root.exists() {
            debug!(asset = %asset.source, ?root, "destination root exists, skipping");
            return AssetOutcome::AlreadyPresent;
        }

        match self.stage_and_promote(asset, root) {
            Ok(outcome) => outcome,
            Err(e) => AssetOutcome::Failed(e),
        }
    }

    fn stage_and_promote(&self, asset: &AssetSpec, root: &Path) -> Result<AssetOutcome> {
        let copy_failed = |e: std::io::Error| {
            Error::Materialize(MaterializeError::CopyFailed {
                asset: asset.source.clone(),
                dest: root.to_path_buf(),
                reason: e.to_string(),
            })
        };

        let parent = root.parent().unwrap_or(&self.data_dir);
        std::fs::create_dir_all(parent).map_err(copy_failed)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(copy_failed)?;

        let bundle = self.bundle.as_ref();
        let (files, rejected_entries) = match asset.kind {
            AssetKind::Tree => {
                if !bundle.is_dir(&asset.source) {
                    return Err(Error::Materialize(MaterializeError::AssetNotFound {
                        asset: asset.source.clone(),
                    }));
                }
                let files =
                    copy_asset_tree(bundle, &asset.source, staging.path(), self.buffer_size)?;
                (files.len(), Vec::new())
            }
            AssetKind::Zip => {
                let expansion =
                    copy_zip_asset(bundle, &asset.source, staging.path(), self.buffer_size)?;
                (expansion.files.len(), expansion.rejected_entries)
            }
            AssetKind::File => {
                return Err(Error::Other(format!(
                    "{} is a file asset and has no destination root",
                    asset.source
                )));
            }
        };

        std::fs::rename(staging.path(), root).map_err(copy_failed)?;

        Ok(AssetOutcome::Materialized {
            files,
            rejected_entries,
        })
    }

    fn record(
        &self,
        report: &mut MaterializeReport,
        source: &str,
        destination: PathBuf,
        outcome: AssetOutcome,
    ) {
        match &outcome {
            AssetOutcome::Materialized {
                files,
                rejected_entries,
            } => {
                info!(
                    asset = source,
                    ?destination,
                    files,
                    rejected = rejected_entries.len(),
                    "materialized asset"
                );
                self.emit_event(Event::AssetMaterialized {
                    source: source.to_string(),
                    destination: destination.clone(),
                });
            }
            AssetOutcome::AlreadyPresent => {
                self.emit_event(Event::AssetSkipped {
                    source: source.to_string(),
                    destination: destination.clone(),
                });
            }
            AssetOutcome::Failed(e) => {
                warn!(asset = source, ?destination, error = %e, "failed to materialize asset");
                self.emit_event(Event::AssetFailed {
                    source: source.to_string(),
                    error: e.to_string(),
                });
            }
        }

        report.outcomes.push(AssetReport {
            source: source.to_string(),
            destination,
            outcome,
        });
    }
}

/// Completion signal for a background materialization run
///
/// Cloneable; every clone observes the same report.
#[derive(Clone, Debug)]
pub struct MaterializeHandle {
    rx: watch::Receiver<Option<Arc<MaterializeReport>>>,
}

impl MaterializeHandle {
    pub(crate) fn pending() -> (watch::Sender<Option<Arc<MaterializeReport>>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { rx })
    }

    /// Wait until the run has finished and return its report
    ///
    /// Fails if the run was abandoned before completing.
    pub async fn wait(&self) -> Result<Arc<MaterializeReport>> {
        let mut rx = self.rx.clone();
        let report = rx.wait_for(Option::is_some).await.map_err(|_| {
            Error::Materialize(MaterializeError::TaskFailed(
                "materialization ended without a report".to_string(),
            ))
        })?;
        report.clone().ok_or_else(|| {
            Error::Materialize(MaterializeError::TaskFailed(
                "materialization ended without a report".to_string(),
            ))
        })
    }

    /// Whether the run has finished
    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The report, if the run has finished
    pub fn report(&self) -> Option<Arc<MaterializeReport>> {
        self.rx.borrow().clone()
    }
}
