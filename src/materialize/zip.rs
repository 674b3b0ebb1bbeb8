//! Bundled ZIP archive expansion

use super::bundle::Bundle;
use crate::error::{Error, MaterializeError, Result};
use crate::utils::{copy_buffered, resolve_within};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What [`copy_zip_asset`] wrote and refused
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipExpansion {
    /// Files written, in central-directory order
    pub files: Vec<PathBuf>,
    /// Entry names that would have landed outside the destination
    pub rejected_entries: Vec<String>,
}

fn archive_unreadable(asset: &str, e: impl std::fmt::Display) -> Error {
    Error::Materialize(MaterializeError::ArchiveUnreadable {
        asset: asset.to_string(),
        reason: e.to_string(),
    })
}

/// Expand the bundled archive `zip_asset` under `dest_dir`
///
/// Entry names are resolved against `dest_dir` before anything is written.
/// Absolute names and names climbing out with `..` are skipped and listed
/// in [`ZipExpansion::rejected_entries`]; the remaining entries are still
/// extracted.
pub fn copy_zip_asset(
    bundle: &dyn Bundle,
    zip_asset: &str,
    dest_dir: &Path,
    buffer_size: usize,
) -> Result<ZipExpansion> {
    let reader = bundle.open_seekable(zip_asset)?;
    let mut archive =
        ::zip::ZipArchive::new(reader).map_err(|e| archive_unreadable(zip_asset, e))?;

    std::fs::create_dir_all(dest_dir).map_err(|e| {
        Error::Materialize(MaterializeError::CopyFailed {
            asset: zip_asset.to_string(),
            dest: dest_dir.to_path_buf(),
            reason: e.to_string(),
        })
    })?;

    let mut expansion = ZipExpansion::default();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| archive_unreadable(zip_asset, e))?;
        let name = entry.name().to_string();

        let Some(target) = resolve_within(dest_dir, Path::new(&name)) else {
            warn!(asset = zip_asset, entry = %name, "skipping entry outside destination");
            expansion.rejected_entries.push(name);
            continue;
        };

        let write_failed = |e: std::io::Error| {
            Error::Materialize(MaterializeError::CopyFailed {
                asset: format!("{zip_asset}:{name}"),
                dest: target.clone(),
                reason: e.to_string(),
            })
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(write_failed)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        let mut out = std::fs::File::create(&target).map_err(write_failed)?;
        let bytes = copy_buffered(&mut entry, &mut out, buffer_size).map_err(write_failed)?;

        debug!(asset = zip_asset, entry = %name, bytes, "extracted entry");
        expansion.files.push(target);
    }

    Ok(expansion)
}
