//! Core types and events

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Metadata descriptor read from a driver package (`meta.json`)
///
/// Structural equality of this record is the duplicate key: two archives
/// with different file names but identical descriptors are the same driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverMetadata {
    /// Descriptor schema version
    #[serde(default)]
    pub schema_version: Option<u32>,
    /// Driver name shown in the list
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Package author
    #[serde(default)]
    pub author: Option<String>,
    /// Package revision
    #[serde(default, deserialize_with = "lenient_string")]
    pub package_version: Option<String>,
    /// GPU vendor the driver targets
    #[serde(default)]
    pub vendor: Option<String>,
    /// Upstream driver version
    #[serde(default, deserialize_with = "lenient_string")]
    pub driver_version: Option<String>,
    /// Minimum platform API level
    #[serde(default, deserialize_with = "lenient_u32")]
    pub min_api: Option<u32>,
    /// Driver library entry inside the package
    #[serde(default)]
    pub library_name: Option<String>,
}

impl DriverMetadata {
    /// Metadata with only a name set
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            schema_version: None,
            name: name.into(),
            description: None,
            author: None,
            package_version: None,
            vendor: None,
            driver_version: None,
            min_api: None,
            library_name: None,
        }
    }
}

impl fmt::Display for DriverMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.driver_version {
            Some(version) => write!(f, "{} ({})", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

// Packages in the wild write versions both as numbers and as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    String(String),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<NumberOrString>::deserialize(deserializer)?.map(|v| match v {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::String(s) => s,
        }),
    )
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid api level {n}"))),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid api level {s:?}"))),
    }
}

/// A driver package registered in the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledDriver {
    /// Backing archive in driver storage
    pub path: PathBuf,
    /// Parsed descriptor
    pub metadata: DriverMetadata,
}

/// Which configuration a driver selection applies to
///
/// A per-title selection overrides the global one for that title only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "title_id", rename_all = "snake_case")]
pub enum DriverScope {
    /// Applies to every title without its own selection
    Global,
    /// Applies to one title, keyed by content identifier
    Title(String),
}

impl fmt::Display for DriverScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverScope::Global => f.write_str("global"),
            DriverScope::Title(id) => write!(f, "title {id}"),
        }
    }
}

/// Event emitted while materializing assets, installing drivers and downloading packages
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Materialization started
    MaterializeStarted {
        /// Number of planned assets, key file included
        assets: usize,
    },

    /// One asset was copied into storage
    AssetMaterialized {
        /// Bundle-relative asset name
        source: String,
        /// Destination path
        destination: PathBuf,
    },

    /// One asset was already present and left alone
    AssetSkipped {
        /// Bundle-relative asset name
        source: String,
        /// Destination path
        destination: PathBuf,
    },

    /// One asset failed; the others continue
    AssetFailed {
        /// Bundle-relative asset name
        source: String,
        /// Error message
        error: String,
    },

    /// Materialization finished
    MaterializeComplete {
        /// Assets copied in this run
        materialized: usize,
        /// Assets already present
        skipped: usize,
        /// Assets that failed
        failed: usize,
    },

    /// A package entered the install pipeline
    InstallStarted {
        /// Suggested file name
        file_name: String,
    },

    /// A package was validated and registered
    DriverInstalled {
        /// Storage path
        path: PathBuf,
        /// Parsed descriptor
        metadata: DriverMetadata,
        /// Scope the new driver was selected in
        scope: DriverScope,
    },

    /// A package already in storage was added to the catalog
    DriverDiscovered {
        /// Storage path
        path: PathBuf,
        /// Parsed descriptor
        metadata: DriverMetadata,
    },

    /// A package was refused
    DriverRejected {
        /// Suggested file name
        file_name: String,
        /// Machine-readable error code
        code: String,
        /// Fixed user-facing message
        message: String,
    },

    /// A driver was removed from the catalog
    DriverRemoved {
        /// Storage path of the removed driver
        path: PathBuf,
    },

    /// The selected driver for a scope changed
    DriverSelected {
        /// Scope whose selection changed
        scope: DriverScope,
        /// New selection, `None` when cleared
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },

    /// A package download started
    DownloadStarted {
        /// Requested URL
        url: String,
    },

    /// Download progress update
    DownloadProgress {
        /// Requested URL
        url: String,
        /// Bytes received so far
        received: u64,
        /// Declared total size
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
        /// Progress percentage (0.0 to 100.0) when the total is known
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<f32>,
    },

    /// A package download finished and is handed to the installer
    DownloadComplete {
        /// Requested URL
        url: String,
        /// File name the package will be installed under
        file_name: String,
        /// Bytes received
        bytes: u64,
    },

    /// A package download failed or was cancelled
    DownloadFailed {
        /// Requested URL
        url: String,
        /// Error message
        error: String,
    },
}
