//! Single-file and directory-tree asset copies

use super::bundle::{Bundle, join_asset};
use crate::error::{Error, MaterializeError, Result};
use crate::utils::copy_buffered;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of [`copy_single_asset`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCopy {
    /// The file was written
    Copied {
        /// Bytes written
        bytes: u64,
    },
    /// The destination already existed and was not touched
    AlreadyPresent,
}

/// Write `reader` to `dest` atomically
///
/// Data goes to a hidden temporary file next to `dest` and is renamed into
/// place once complete. On any failure the temporary file is removed and
/// `dest` is left as it was.
pub(crate) fn write_atomic(
    reader: &mut dyn Read,
    dest: &Path,
    buffer_size: usize,
) -> std::io::Result<u64> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".materialize-")
        .suffix(".part")
        .tempfile_in(parent)?;
    let bytes = copy_buffered(reader, temp.as_file_mut(), buffer_size)?;
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(bytes)
}

fn copy_failed(asset: &str, dest: &Path, e: impl std::fmt::Display) -> Error {
    Error::Materialize(MaterializeError::CopyFailed {
        asset: asset.to_string(),
        dest: dest.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Copy one bundle asset to `dest_dir/dest_file_name`
///
/// Creates `dest_dir` when missing. Does nothing when the destination file
/// already exists.
pub fn copy_single_asset(
    bundle: &dyn Bundle,
    asset: &str,
    dest_dir: &Path,
    dest_file_name: &str,
    buffer_size: usize,
) -> Result<FileCopy> {
    std::fs::create_dir_all(dest_dir).map_err(|e| copy_failed(asset, dest_dir, e))?;

    let dest = dest_dir.join(dest_file_name);
    if dest.exists() {
        debug!(asset, ?dest, "asset already materialized");
        return Ok(FileCopy::AlreadyPresent);
    }

    let mut reader = bundle.open(asset)?;
    let bytes = write_atomic(&mut reader, &dest, buffer_size)
        .map_err(|e| copy_failed(asset, &dest, e))?;

    debug!(asset, ?dest, bytes, "copied asset");
    Ok(FileCopy::Copied { bytes })
}

/// Mirror the bundle directory `asset_dir` under `dest_dir`
///
/// Leaf files are copied unconditionally; only the caller checks whether
/// the tree was already materialized. Returns the written file paths in
/// traversal order.
pub fn copy_asset_tree(
    bundle: &dyn Bundle,
    asset_dir: &str,
    dest_dir: &Path,
    buffer_size: usize,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    copy_tree_into(bundle, asset_dir, dest_dir, buffer_size, &mut written)?;
    Ok(written)
}

fn copy_tree_into(
    bundle: &dyn Bundle,
    asset_dir: &str,
    dest_dir: &Path,
    buffer_size: usize,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    std::fs::create_dir_all(dest_dir).map_err(|e| copy_failed(asset_dir, dest_dir, e))?;

    for child in bundle.list(asset_dir)? {
        let asset = join_asset(asset_dir, &child);
        let dest = dest_dir.join(&child);

        if bundle.is_dir(&asset) {
            copy_tree_into(bundle, &asset, &dest, buffer_size, written)?;
        } else {
            let mut reader = bundle.open(&asset)?;
            write_atomic(&mut reader, &dest, buffer_size)
                .map_err(|e| copy_failed(&asset, &dest, e))?;
            written.push(dest);
        }
    }

    Ok(())
}
