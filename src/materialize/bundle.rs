//! Read-only application bundles
//!
//! A bundle is addressed by `/`-separated relative names, the way packaged
//! application assets are. Two implementations are provided: a plain
//! directory on disk and a package archive read in place.

use crate::error::{Error, MaterializeError, Result};
use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Readable and seekable stream, used to open bundled archives
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Read-only set of files packaged with the application
pub trait Bundle: Send + Sync {
    /// Names of the immediate children of a bundle directory
    ///
    /// Returns an empty list for files and missing entries. `""` lists the
    /// bundle root. Order is the bundle's native enumeration order.
    fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Open an asset for streaming reads
    fn open(&self, asset: &str) -> Result<Box<dyn Read + Send + '_>>;

    /// Whether `asset` is a directory
    ///
    /// Defaults to "has a non-empty listing", which is all a packaged
    /// bundle can express.
    fn is_dir(&self, asset: &str) -> bool {
        self.list(asset).map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// Open an asset for random access, for reading bundled archives
    ///
    /// The default buffers the asset in memory.
    fn open_seekable(&self, asset: &str) -> Result<Box<dyn ReadSeek + '_>> {
        let mut data = Vec::new();
        self.open(asset)?.read_to_end(&mut data)?;
        Ok(Box::new(Cursor::new(data)))
    }
}

/// Check a bundle-relative name and split it into components
fn asset_components(asset: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    for component in Path::new(asset).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                MaterializeError::InvalidAssetPath {
                    asset: asset.to_string(),
                    reason: "not valid UTF-8".to_string(),
                }
            })?),
            Component::CurDir => {}
            _ => {
                return Err(Error::Materialize(MaterializeError::InvalidAssetPath {
                    asset: asset.to_string(),
                    reason: "must be relative and stay inside the bundle".to_string(),
                }));
            }
        }
    }
    Ok(parts)
}

/// Join a bundle directory and a child name
pub(crate) fn join_asset(dir: &str, child: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        child.to_string()
    } else {
        format!("{dir}/{child}")
    }
}

/// Bundle backed by a directory on disk
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    /// Use `root` as the bundle root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Bundle root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, asset: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        path.extend(asset_components(asset)?);
        Ok(path)
    }
}

impl Bundle for DirectoryBundle {
    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.resolve(dir)?;
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn open(&self, asset: &str) -> Result<Box<dyn Read + Send + '_>> {
        let path = self.resolve(asset)?;
        if !path.is_file() {
            return Err(Error::Materialize(MaterializeError::AssetNotFound {
                asset: asset.to_string(),
            }));
        }
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn is_dir(&self, asset: &str) -> bool {
        self.resolve(asset).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn open_seekable(&self, asset: &str) -> Result<Box<dyn ReadSeek + '_>> {
        let path = self.resolve(asset)?;
        if !path.is_file() {
            return Err(Error::Materialize(MaterializeError::AssetNotFound {
                asset: asset.to_string(),
            }));
        }
        Ok(Box::new(std::fs::File::open(path)?))
    }
}

/// Bundle read directly out of an application package (a ZIP file)
///
/// Assets are entries under an optional prefix, `assets/` for an APK.
/// Entry data is inflated into memory on open, so this suits key files and
/// driver-sized packages rather than very large media.
pub struct ArchiveBundle {
    archive: Mutex<zip::ZipArchive<std::fs::File>>,
    prefix: String,
    path: PathBuf,
}

impl ArchiveBundle {
    /// Open `path` and expose entries below `prefix` (may be empty)
    pub fn from_package(path: impl Into<PathBuf>, prefix: &str) -> Result<Self> {
        let path = path.into();
        let file = std::fs::File::open(&path)?;
        let archive = zip::ZipArchive::new(file).map_err(|e| {
            Error::Materialize(MaterializeError::ArchiveUnreadable {
                asset: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        let prefix = prefix.trim_matches('/');
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        debug!(?path, %prefix, entries = archive.len(), "opened package bundle");
        Ok(Self {
            archive: Mutex::new(archive),
            prefix,
            path,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, zip::ZipArchive<std::fs::File>>> {
        self.archive
            .lock()
            .map_err(|_| Error::Other(format!("bundle {} lock poisoned", self.path.display())))
    }
}

impl Bundle for ArchiveBundle {
    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let parts = asset_components(dir)?;
        let mut base = self.prefix.clone();
        for part in parts {
            base.push_str(part);
            base.push('/');
        }

        let mut archive = self.lock()?;
        let mut names: Vec<String> = Vec::new();
        // Central directory order, not the archive's name map
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            let Some(rest) = entry.name().strip_prefix(base.as_str()) else {
                continue;
            };
            let child = rest.split('/').next().unwrap_or_default();
            if !child.is_empty() && !names.iter().any(|n| n == child) {
                names.push(child.to_string());
            }
        }
        Ok(names)
    }

    fn open(&self, asset: &str) -> Result<Box<dyn Read + Send + '_>> {
        let name = format!("{}{}", self.prefix, asset_components(asset)?.join("/"));
        let mut archive = self.lock()?;
        let mut entry = match archive.by_name(&name) {
            Ok(entry) if !entry.is_dir() => entry,
            Ok(_) | Err(zip::result::ZipError::FileNotFound) => {
                return Err(Error::Materialize(MaterializeError::AssetNotFound {
                    asset: asset.to_string(),
                }));
            }
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(Box::new(Cursor::new(data)))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn build_package(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_directory_bundle_list_and_open() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("folder/sub")).unwrap();
        std::fs::write(dir.path().join("folder/a.txt"), b"alpha").unwrap();
        std::fs::write(dir.path().join("folder/sub/b.txt"), b"beta").unwrap();

        let bundle = DirectoryBundle::new(dir.path());
        let mut children = bundle.list("folder").unwrap();
        children.sort();
        assert_eq!(children, vec!["a.txt", "sub"]);
        assert!(bundle.is_dir("folder/sub"));
        assert!(!bundle.is_dir("folder/a.txt"));
        assert!(bundle.list("folder/a.txt").unwrap().is_empty());
        assert!(bundle.list("missing").unwrap().is_empty());

        let mut content = String::new();
        bundle
            .open("folder/sub/b.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "beta");
    }

    #[test]
    fn test_directory_bundle_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let bundle = DirectoryBundle::new(dir.path().join("assets"));
        assert!(matches!(
            bundle.open("../secret"),
            Err(Error::Materialize(MaterializeError::InvalidAssetPath { .. }))
        ));
        assert!(bundle.list("/etc").is_err());
    }

    #[test]
    fn test_directory_bundle_missing_asset() {
        let dir = TempDir::new().unwrap();
        let bundle = DirectoryBundle::new(dir.path());
        assert!(matches!(
            bundle.open("prod.keys"),
            Err(Error::Materialize(MaterializeError::AssetNotFound { .. }))
        ));
    }

    #[test]
    fn test_archive_bundle_lists_children_under_prefix() {
        let dir = TempDir::new().unwrap();
        let apk = dir.path().join("app.apk");
        build_package(
            &apk,
            &[
                ("AndroidManifest.xml", b"<manifest/>"),
                ("assets/prod.keys", b"keys"),
                ("assets/01007EF00011E000/romfs/data.bin", b"romfs"),
                ("assets/01007EF00011E000/exefs/main", b"exefs"),
            ],
        );

        let bundle = ArchiveBundle::from_package(&apk, "assets").unwrap();
        assert_eq!(bundle.list("").unwrap(), vec!["prod.keys", "01007EF00011E000"]);
        assert_eq!(
            bundle.list("01007EF00011E000").unwrap(),
            vec!["romfs", "exefs"]
        );
        assert!(bundle.is_dir("01007EF00011E000/romfs"));
        assert!(!bundle.is_dir("prod.keys"));

        let mut content = Vec::new();
        bundle
            .open("01007EF00011E000/exefs/main")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"exefs");
        assert!(bundle.open("AndroidManifest.xml").is_err());
    }

    #[test]
    fn test_archive_bundle_open_seekable_reads_nested_zip() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner.zip");
        build_package(&inner, &[("meta.json", b"{}")]);
        let inner_bytes = std::fs::read(&inner).unwrap();

        let apk = dir.path().join("app.apk");
        build_package(&apk, &[("assets/turnip.zip", &inner_bytes)]);

        let bundle = ArchiveBundle::from_package(&apk, "assets/").unwrap();
        let reader = bundle.open_seekable("turnip.zip").unwrap();
        let archive = zip::ZipArchive::new(reader).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_join_asset() {
        assert_eq!(join_asset("", "a"), "a");
        assert_eq!(join_asset("dir/", "a"), "dir/a");
        assert_eq!(join_asset("dir/sub", "a"), "dir/sub/a");
    }
}
