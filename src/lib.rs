//! # driver-depot
//!
//! Bundled asset materialization and GPU driver package installation for
//! emulator frontends.
//!
//! ## Overview
//!
//! driver-depot does two jobs:
//! - **Materialize** - on first run, copy the key file, shipped content
//!   folders and bundled driver archives out of the read-only application
//!   bundle into writable storage. Anything already present is left alone.
//! - **Install** - validate a user-picked or downloaded driver archive,
//!   read its `meta.json` descriptor, refuse it if an identical driver is
//!   installed, otherwise register and select it.
//!
//! Consumers subscribe to [`Event`]s instead of polling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use driver_depot::{Config, DriverDepot, DriverScope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let depot = DriverDepot::new(Config::default()).await?;
//!
//!     let mut events = depot.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Copy bundled assets in the background and wait before using them
//!     let report = depot.start_materialization()?.wait().await?;
//!     println!("{} assets copied", report.materialized());
//!
//!     let token = depot.request_token();
//!     match depot
//!         .install_release("Turnip-24.1.0.adpkg_R18", DriverScope::Global, &token)
//!         .await
//!     {
//!         Ok(driver) => println!("installed {}", driver.metadata),
//!         Err(e) => println!("{}", e.user_message()),
//!     }
//!
//!     depot.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Installed driver catalog and selections
pub mod catalog;
/// Configuration types
pub mod config;
/// The `DriverDepot` facade (decomposed into focused submodules)
pub mod depot;
/// Error types
pub mod error;
/// Driver package downloads
pub mod fetch;
/// Driver package validation and installation
pub mod install;
/// First-run asset materialization
pub mod materialize;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::DriverCatalog;
pub use config::{AssetKind, AssetRoot, AssetSpec, Config, DriverRelease, FileCollisionAction};
pub use depot::DriverDepot;
pub use error::{
    ALREADY_INSTALLED_MESSAGE, DownloadError, Error, InstallError, MaterializeError, Result,
    SELECTION_INVALID_MESSAGE,
};
pub use fetch::{FetchRequest, FetchedPackage, Fetcher, HttpFetcher};
pub use install::{DriverInstaller, PackageSource};
pub use materialize::{
    ArchiveBundle, AssetOutcome, Bundle, DirectoryBundle, MaterializeHandle, MaterializeReport,
    Materializer,
};
pub use tokio_util::sync::CancellationToken;
pub use types::{DriverMetadata, DriverScope, Event, InstalledDriver};
