//! Driver package installation
//!
//! A package moves through a fixed pipeline: the byte source is copied into
//! driver storage, the archive is validated and its descriptor parsed, the
//! metadata is checked against the catalog, and the package is either
//! rejected or registered and selected.
//!
//! Dedup is by metadata, never by file name: two archives with different
//! names but identical descriptors are the same driver.

mod installer;
mod metadata;
mod package;


pub use installer::DriverInstaller;
pub use metadata::{read_metadata, read_package_metadata};
pub use package::{PackageSource, sanitize_file_name};
