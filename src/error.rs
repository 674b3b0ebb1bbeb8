//! Error types for driver-depot
//!
//! This module provides the error hierarchy for the library:
//! - Domain-specific error types (Materialize, Install, Download)
//! - Machine-readable error codes for UI consumers
//! - The two fixed user-facing rejection messages for driver installation
//!
//! The structured cause is always preserved in the error value even when the
//! message surfaced to the user is generic.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver-depot operations
pub type Result<T> = std::result::Result<T, Error>;

/// User-facing message for any package that failed to copy or validate
pub const SELECTION_INVALID_MESSAGE: &str = "Invalid driver selected, using system default!";

/// User-facing message for a package whose metadata is already installed
pub const ALREADY_INSTALLED_MESSAGE: &str = "Driver already installed";

/// Main error type for driver-depot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "data_dir")
        key: Option<String>,
    },

    /// Bundle materialization error
    #[error("materialization error: {0}")]
    Materialize(#[from] MaterializeError),

    /// Driver package installation error
    #[error("install error: {0}")]
    Install(#[from] InstallError),

    /// Driver download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be read
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while copying bundle assets into writable storage
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The named asset is not present in the bundle
    #[error("asset {asset} not found in bundle")]
    AssetNotFound {
        /// Bundle-relative asset name
        asset: String,
    },

    /// The asset name is not a valid bundle-relative path
    #[error("invalid asset path {asset}: {reason}")]
    InvalidAssetPath {
        /// Bundle-relative asset name
        asset: String,
        /// Why the path was refused
        reason: String,
    },

    /// Copying the asset to its destination failed
    #[error("failed to copy {asset} to {dest}: {reason}")]
    CopyFailed {
        /// Bundle-relative asset name
        asset: String,
        /// Destination path
        dest: PathBuf,
        /// The reason the copy failed
        reason: String,
    },

    /// A bundled archive could not be opened or walked
    #[error("failed to read bundled archive {asset}: {reason}")]
    ArchiveUnreadable {
        /// Bundle-relative archive name
        asset: String,
        /// The reason the archive was unreadable
        reason: String,
    },

    /// The background materialization task did not complete
    #[error("materialization task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised while installing a driver package
#[derive(Debug, Error)]
pub enum InstallError {
    /// The package is not a readable archive
    #[error("invalid driver package {path}: {reason}")]
    InvalidPackage {
        /// Where the package was copied to
        path: PathBuf,
        /// The reason validation failed
        reason: String,
    },

    /// The archive lacks the metadata descriptor entry
    #[error("driver package {path} has no {descriptor} entry")]
    MissingDescriptor {
        /// Where the package was copied to
        path: PathBuf,
        /// Expected descriptor entry name
        descriptor: String,
    },

    /// The descriptor entry exists but cannot be parsed
    #[error("driver package {path} has a malformed descriptor: {reason}")]
    MalformedDescriptor {
        /// Where the package was copied to
        path: PathBuf,
        /// Parser error
        reason: String,
    },

    /// The descriptor names a library that is not in the archive
    #[error("driver package {path} does not contain library {library}")]
    MissingLibrary {
        /// Where the package was copied to
        path: PathBuf,
        /// Library file named by the descriptor
        library: String,
    },

    /// A driver with structurally equal metadata is already installed
    #[error("driver {name} is already installed at {existing}")]
    AlreadyInstalled {
        /// Driver name from the descriptor
        name: String,
        /// Storage path of the installed copy
        existing: PathBuf,
    },

    /// The suggested file name cannot be used in driver storage
    #[error("invalid package file name {name:?}: {reason}")]
    InvalidFileName {
        /// The suggested file name
        name: String,
        /// Why it was refused
        reason: String,
    },

    /// File collision at destination
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision (e.g., "file already exists")
        reason: String,
    },

    /// Copying the package into driver storage failed
    #[error("failed to copy driver package to {path}: {reason}")]
    CopyFailed {
        /// Destination path
        path: PathBuf,
        /// The reason the copy failed
        reason: String,
    },
}

impl InstallError {
    /// Whether this rejection is a duplicate rather than a bad package
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InstallError::AlreadyInstalled { .. })
    }

    /// The fixed message shown to the user for this rejection
    ///
    /// Every failure collapses into either [`ALREADY_INSTALLED_MESSAGE`] or
    /// [`SELECTION_INVALID_MESSAGE`]; the variant keeps the real cause.
    pub fn user_message(&self) -> &'static str {
        if self.is_duplicate() {
            ALREADY_INSTALLED_MESSAGE
        } else {
            SELECTION_INVALID_MESSAGE
        }
    }
}

/// Driver download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The download was cancelled by its owner
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// Requested URL
        url: String,
    },

    /// Fewer bytes arrived than the server declared
    #[error("download of {url} ended early: expected {expected} bytes, got {received}")]
    Incomplete {
        /// Requested URL
        url: String,
        /// Declared content length
        expected: u64,
        /// Bytes written before the stream ended
        received: u64,
    },

    /// No configured release has this name
    #[error("unknown driver release {0}")]
    UnknownRelease(String),
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Materialize(e) => match e {
                MaterializeError::AssetNotFound { .. } => "asset_not_found",
                MaterializeError::InvalidAssetPath { .. } => "invalid_asset_path",
                MaterializeError::CopyFailed { .. } => "asset_copy_failed",
                MaterializeError::ArchiveUnreadable { .. } => "archive_unreadable",
                MaterializeError::TaskFailed(_) => "materialize_task_failed",
            },
            Error::Install(e) => match e {
                InstallError::InvalidPackage { .. } => "invalid_package",
                InstallError::MissingDescriptor { .. } => "missing_descriptor",
                InstallError::MalformedDescriptor { .. } => "malformed_descriptor",
                InstallError::MissingLibrary { .. } => "missing_library",
                InstallError::AlreadyInstalled { .. } => "already_installed",
                InstallError::InvalidFileName { .. } => "invalid_file_name",
                InstallError::FileCollision { .. } => "file_collision",
                InstallError::CopyFailed { .. } => "package_copy_failed",
            },
            Error::Download(e) => match e {
                DownloadError::HttpStatus { .. } => "http_status",
                DownloadError::Cancelled { .. } => "download_cancelled",
                DownloadError::Incomplete { .. } => "download_incomplete",
                DownloadError::UnknownRelease(_) => "unknown_release",
            },
            Error::Io(_) => "io_error",
            Error::Archive(_) => "archive_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }

    /// The fixed message shown to the user when an install attempt fails
    ///
    /// Anything other than a duplicate (download failures included) is
    /// reported as an invalid selection.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Install(e) => e.user_message(),
            _ => SELECTION_INVALID_MESSAGE,
        }
    }
}
