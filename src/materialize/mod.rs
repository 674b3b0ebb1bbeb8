//! First-run copy of bundled assets into writable storage
//!
//! The application ships a key file, a content folder and a few driver
//! packages inside its read-only bundle. This module copies them into the
//! data directory once: a destination that already exists is never
//! rewritten, across restarts.
//!
//! Three copy strategies cover the plan:
//! - [`copy_single_asset`] for one file, written atomically
//! - [`copy_asset_tree`] for a folder, mirrored recursively
//! - [`copy_zip_asset`] for a bundled archive, expanded with a containment guard
//!
//! [`Materializer`] drives the configured plan and reports a per-asset
//! outcome. Run it in the background and wait on a [`MaterializeHandle`]
//! before reading materialized paths.

mod bundle;
mod copy;
mod materializer;
mod zip;


pub use bundle::{ArchiveBundle, Bundle, DirectoryBundle, ReadSeek};
pub use copy::{FileCopy, copy_asset_tree, copy_single_asset};
pub use materializer::{
    AssetOutcome, AssetReport, MaterializeHandle, MaterializeReport, Materializer,
};
pub use self::zip::{ZipExpansion, copy_zip_asset};
