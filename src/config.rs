//! Configuration types for driver-depot

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Storage roots and directory names
///
/// Groups the read-only bundle root and the writable data root with the
/// names of its well-known subdirectories.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Writable app-private root (default: "./data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Read-only application bundle (default: "./assets")
    ///
    /// Either a directory or a `.zip`/`.apk` package file.
    #[serde(default = "default_bundle_path")]
    pub bundle_path: PathBuf,

    /// Scratch directory for in-flight downloads (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Driver storage directory name under `data_dir` (default: "gpu_drivers")
    #[serde(default = "default_driver_dir_name")]
    pub driver_dir_name: String,

    /// Key directory name under `data_dir` (default: "keys")
    #[serde(default = "default_keys_dir_name")]
    pub keys_dir_name: String,

    /// Per-content load directory name under `data_dir` (default: "load")
    #[serde(default = "default_load_dir_name")]
    pub load_dir_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bundle_path: default_bundle_path(),
            temp_dir: default_temp_dir(),
            driver_dir_name: default_driver_dir_name(),
            keys_dir_name: default_keys_dir_name(),
            load_dir_name: default_load_dir_name(),
        }
    }
}

/// How a bundle asset is copied into storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A single file, copied once
    File,
    /// A bundle directory, mirrored recursively
    Tree,
    /// A bundled ZIP archive, expanded into the destination
    Zip,
}

/// Storage directory an asset destination is relative to
///
/// Resolved against the configured directory names, so renaming the driver
/// or load directory moves the planned assets with it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRoot {
    /// The data directory itself (default)
    #[default]
    Data,
    /// Driver storage (`data_dir/driver_dir_name`)
    Drivers,
    /// Per-content load directory (`data_dir/load_dir_name`)
    Load,
}

/// One entry of the materialization plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Bundle-relative asset name
    pub source: String,
    /// Copy strategy
    pub kind: AssetKind,
    /// Directory `destination` is relative to
    #[serde(default)]
    pub root: AssetRoot,
    /// Destination relative to `root`
    ///
    /// For [`AssetKind::File`] this is the destination file; for trees and
    /// archives it is the destination root whose existence marks the asset
    /// as materialized.
    pub destination: PathBuf,
}

impl AssetSpec {
    /// Single file copied to `destination`
    pub fn file(source: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            kind: AssetKind::File,
            root: AssetRoot::Data,
            destination: destination.into(),
        }
    }

    /// Directory mirrored under `destination`
    pub fn tree(source: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            kind: AssetKind::Tree,
            root: AssetRoot::Data,
            destination: destination.into(),
        }
    }

    /// Archive expanded under `destination`
    pub fn zip(source: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            kind: AssetKind::Zip,
            root: AssetRoot::Data,
            destination: destination.into(),
        }
    }

    /// Resolve `destination` against `root` instead of the data directory
    pub fn under(mut self, root: AssetRoot) -> Self {
        self.root = root;
        self
    }
}

/// First-run asset materialization plan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterializeConfig {
    /// Key file copied into the keys directory (default: "prod.keys")
    #[serde(default = "default_key_file")]
    pub key_file: Option<String>,

    /// Folder, file and archive assets (default: the shipped content folder
    /// and bundled Turnip driver packages)
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetSpec>,

    /// Copy buffer size in bytes (default: 8192)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            assets: default_assets(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Refuse the install, keep existing
    Skip,
}

/// Driver package installation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallConfig {
    /// What to do when the package file name is already taken in driver storage
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Metadata descriptor entry inside a driver archive (default: "meta.json")
    #[serde(default = "default_descriptor_name")]
    pub descriptor_name: String,

    /// Require the library named by the descriptor to be present (default: true)
    #[serde(default = "default_true")]
    pub require_library_entry: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            file_collision: FileCollisionAction::default(),
            descriptor_name: default_descriptor_name(),
            require_library_entry: true,
        }
    }
}

/// A downloadable driver release
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRelease {
    /// Display name, also the lookup key for [`crate::DriverDepot::install_release`]
    pub name: String,
    /// Download URL
    pub url: String,
    /// File name the package is stored under
    pub file_name: String,
}

/// Driver download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Whole-request timeout (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Known releases offered for download
    #[serde(default = "default_releases")]
    pub releases: Vec<DriverRelease>,

    /// Event channel capacity (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_download_timeout(),
            releases: default_releases(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Main configuration for [`crate::DriverDepot`]
///
/// Fields are organized into logical sub-configs:
/// - [`storage`](StorageConfig) - bundle and data roots
/// - [`materialize`](MaterializeConfig) - first-run asset plan
/// - [`install`](InstallConfig) - package validation and collisions
/// - [`download`](DownloadConfig) - transport settings and known releases
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bundle and storage roots
    #[serde(default)]
    pub storage: StorageConfig,

    /// First-run asset plan
    #[serde(default)]
    pub materialize: MaterializeConfig,

    /// Driver package installation
    #[serde(default)]
    pub install: InstallConfig,

    /// Driver downloads
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("driver_dir_name", &self.storage.driver_dir_name),
            ("keys_dir_name", &self.storage.keys_dir_name),
            ("load_dir_name", &self.storage.load_dir_name),
        ] {
            if !is_single_component(name) {
                return Err(Error::Config {
                    message: format!("{name:?} must be a single directory name"),
                    key: Some(key.to_string()),
                });
            }
        }

        if self.materialize.buffer_size == 0 {
            return Err(Error::Config {
                message: "buffer size must be greater than zero".to_string(),
                key: Some("buffer_size".to_string()),
            });
        }

        if self.install.descriptor_name.is_empty() {
            return Err(Error::Config {
                message: "descriptor name must not be empty".to_string(),
                key: Some("descriptor_name".to_string()),
            });
        }

        if let Some(key_file) = &self.materialize.key_file {
            let file_name = key_file.rsplit('/').next().unwrap_or_default();
            if key_file.starts_with('/') || matches!(file_name, "" | "." | "..") {
                return Err(Error::Config {
                    message: format!("key file {key_file:?} must name a file inside the bundle"),
                    key: Some("key_file".to_string()),
                });
            }
        }

        for asset in &self.materialize.assets {
            let escapes = asset.destination.is_absolute()
                || asset
                    .destination
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)));
            if escapes || asset.destination.as_os_str().is_empty() {
                return Err(Error::Config {
                    message: format!(
                        "asset destination {} must be relative to its storage root",
                        asset.destination.display()
                    ),
                    key: Some("assets".to_string()),
                });
            }
        }

        if self.download.event_capacity == 0 {
            return Err(Error::Config {
                message: "event capacity must be greater than zero".to_string(),
                key: Some("event_capacity".to_string()),
            });
        }

        Ok(())
    }

    /// Driver storage directory
    pub fn driver_dir(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.driver_dir_name)
    }

    /// Key directory
    pub fn keys_dir(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.keys_dir_name)
    }

    /// Absolute destination of a planned asset
    pub fn asset_destination(&self, asset: &AssetSpec) -> PathBuf {
        let root = match asset.root {
            AssetRoot::Data => self.storage.data_dir.clone(),
            AssetRoot::Drivers => self.driver_dir(),
            AssetRoot::Load => self.storage.data_dir.join(&self.storage.load_dir_name),
        };
        root.join(&asset.destination)
    }

    /// Load directory for one content identifier
    pub fn load_dir(&self, content_id: &str) -> PathBuf {
        self.storage
            .data_dir
            .join(&self.storage.load_dir_name)
            .join(content_id)
    }

    /// Look up a known release by name
    pub fn release(&self, name: &str) -> Option<&DriverRelease> {
        self.download.releases.iter().find(|r| r.name == name)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_bundle_path() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_driver_dir_name() -> String {
    "gpu_drivers".to_string()
}

fn default_keys_dir_name() -> String {
    "keys".to_string()
}

fn default_load_dir_name() -> String {
    "load".to_string()
}

fn default_key_file() -> Option<String> {
    Some("prod.keys".to_string())
}

fn default_assets() -> Vec<AssetSpec> {
    let content_id = "01007EF00011E000";
    let mut assets = vec![AssetSpec::tree(content_id, content_id).under(AssetRoot::Load)];
    for package in [
        "Turnip-24.1.0.adpkg_R18.zip",
        "Turnip-24.1.0.adpkg_R16.zip",
        "Turnip-24.1.0.adpkg_R15.zip",
    ] {
        assets.push(AssetSpec::file(package, package).under(AssetRoot::Drivers));
    }
    assets
}

fn default_buffer_size() -> usize {
    8 * 1024
}

fn default_descriptor_name() -> String {
    "meta.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_event_capacity() -> usize {
    256
}

fn default_releases() -> Vec<DriverRelease> {
    const BASE: &str = "https://github.com/K11MCH1/AdrenoToolsDrivers/releases/download";
    vec![
        DriverRelease {
            name: "Turnip-24.1.0.adpkg_R18".to_string(),
            url: format!("{BASE}/v24.1.0_R18/Turnip-24.1.0.adpkg_R18.zip"),
            file_name: "Turnip-24.1.0.adpkg_R18.zip".to_string(),
        },
        DriverRelease {
            name: "Turnip-24.1.0.adpkg_R17".to_string(),
            url: format!("{BASE}/v24.1.0_R17/turnip-24.1.0.adpkg_R17-v2.zip"),
            file_name: "Turnip-24.1.0.adpkg_R17.zip".to_string(),
        },
        DriverRelease {
            name: "Turnip-24.1.0.adpkg_R16".to_string(),
            url: format!("{BASE}/v24.1.0_R16/Turnip-24.1.0.adpkg_R16.zip"),
            file_name: "Turnip-24.1.0.adpkg_R16.zip".to_string(),
        },
    ]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
