//! Driver package validation and descriptor parsing

use crate::error::{Error, InstallError, Result};
use crate::types::DriverMetadata;
use std::io::{Read, Seek};
use std::path::Path;

/// Validate a driver archive and parse its descriptor
///
/// `path` is only used to label errors. The archive must be readable, must
/// contain `descriptor`, and the descriptor must parse into a
/// [`DriverMetadata`] with a non-empty name. When `require_library` is set
/// and the descriptor names a library, that entry must exist too.
pub fn read_metadata<R: Read + Seek>(
    reader: R,
    path: &Path,
    descriptor: &str,
    require_library: bool,
) -> Result<DriverMetadata> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| {
        Error::Install(InstallError::InvalidPackage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;

    let metadata: DriverMetadata = {
        let entry = match archive.by_name(descriptor) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(Error::Install(InstallError::MissingDescriptor {
                    path: path.to_path_buf(),
                    descriptor: descriptor.to_string(),
                }));
            }
            Err(e) => {
                return Err(Error::Install(InstallError::InvalidPackage {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }));
            }
        };
        serde_json::from_reader(entry).map_err(|e| {
            Error::Install(InstallError::MalformedDescriptor {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?
    };

    if metadata.name.trim().is_empty() {
        return Err(Error::Install(InstallError::MalformedDescriptor {
            path: path.to_path_buf(),
            reason: "driver name is empty".to_string(),
        }));
    }

    if require_library
        && let Some(library) = &metadata.library_name
        && archive.by_name(library).is_err()
    {
        return Err(Error::Install(InstallError::MissingLibrary {
            path: path.to_path_buf(),
            library: library.clone(),
        }));
    }

    Ok(metadata)
}

/// Open the archive at `path` and run [`read_metadata`] on it
pub fn read_package_metadata(
    path: &Path,
    descriptor: &str,
    require_library: bool,
) -> Result<DriverMetadata> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Install(InstallError::InvalidPackage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;
    read_metadata(file, path, descriptor, require_library)
}
