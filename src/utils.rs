//! Utility functions for file operations and path manipulation

use crate::config::FileCollisionAction;
use crate::error::{Error, InstallError, Result};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a unique path for a file, handling collisions according to the specified action
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `action` - How to handle file collisions
///
/// # Returns
///
/// Returns the final path to use. For Rename action, this may have a suffix added.
/// For Skip action, returns an error if the file already exists.
/// For Overwrite action, returns the original path unchanged.
///
/// # Examples
///
/// ```
/// use driver_depot::utils::get_unique_path;
/// use driver_depot::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/turnip.zip");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If /tmp/turnip.zip exists, returns /tmp/turnip (1).zip
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Install(InstallError::FileCollision {
                    path: path.to_path_buf(),
                    reason: "file already exists and collision action is skip".to_string(),
                }));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::Install(InstallError::InvalidFileName {
                    name: path.display().to_string(),
                    reason: "cannot extract file stem".to_string(),
                })
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| {
                Error::Install(InstallError::InvalidFileName {
                    name: path.display().to_string(),
                    reason: "cannot extract parent directory".to_string(),
                })
            })?;

            // Try adding (1), (2), (3), ... until we find a unique name
            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Install(InstallError::FileCollision {
                path: path.to_path_buf(),
                reason: format!(
                    "could not find unique filename after {} attempts",
                    MAX_RENAME_ATTEMPTS
                ),
            }))
        }
    }
}

/// Resolve an archive-relative path inside `root`
///
/// Returns `None` when the normalized path would land outside `root`
/// (absolute paths, drive prefixes, or more `..` segments than directories)
/// or when it normalizes to `root` itself.
///
/// ```
/// use driver_depot::utils::resolve_within;
/// use std::path::Path;
///
/// let root = Path::new("/data/drivers");
/// assert_eq!(
///     resolve_within(root, Path::new("lib/../meta.json")),
///     Some(root.join("meta.json"))
/// );
/// assert_eq!(resolve_within(root, Path::new("../../etc/passwd")), None);
/// ```
#[must_use]
pub fn resolve_within(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Some(resolved)
}

/// Stream `reader` into `writer` through a buffer of `buffer_size` bytes
///
/// Returns the number of bytes copied.
pub fn copy_buffered<R, W>(reader: &mut R, writer: &mut W, buffer_size: usize) -> std::io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.flush()?;
    Ok(total)
}

/// Extract a file name for a downloaded package
///
/// Prefers the `Content-Disposition` header (plain or RFC 5987 encoded),
/// then the last URL path segment, then `"driver.zip"`. Unlike a display
/// name, the extension is kept.
pub fn extract_filename_from_response(response: &reqwest::Response, url: &str) -> String {
    if let Some(content_disposition) = response.headers().get("content-disposition")
        && let Ok(value) = content_disposition.to_str()
        && let Some(name) = filename_from_content_disposition(value)
    {
        return name;
    }

    filename_from_url(url).unwrap_or_else(|| "driver.zip".to_string())
}

fn filename_from_content_disposition(value: &str) -> Option<String> {
    // Format: attachment; filename="file.zip" or filename*=UTF-8''file.zip
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // Format is: charset'lang'encoded-filename
            if let Some(idx) = encoded.rfind('\'')
                && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).ok()?;
    Some(decoded.into_owned())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use wiremock::MockServer;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_get_unique_path_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("driver.zip");

        // File doesn't exist, should return original path for all actions
        for action in [
            FileCollisionAction::Rename,
            FileCollisionAction::Overwrite,
            FileCollisionAction::Skip,
        ] {
            assert_eq!(get_unique_path(&path, action).unwrap(), path);
        }
    }

    #[test]
    fn test_get_unique_path_rename_sequential() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("turnip.zip");

        fs::write(&path, "original").unwrap();
        let unique = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(unique, temp_dir.path().join("turnip (1).zip"));

        fs::write(&unique, "first rename").unwrap();
        let unique2 = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(unique2, temp_dir.path().join("turnip (2).zip"));
    }

    #[test]
    fn test_get_unique_path_rename_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("driver");
        fs::write(&path, "original").unwrap();

        let unique = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(unique, temp_dir.path().join("driver (1)"));
    }

    #[test]
    fn test_get_unique_path_multiple_dots() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Turnip-24.1.0.adpkg_R18.zip");
        fs::write(&path, "original").unwrap();

        // Only the last extension is split off
        let unique = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(
            unique,
            temp_dir.path().join("Turnip-24.1.0.adpkg_R18 (1).zip")
        );
    }

    #[test]
    fn test_get_unique_path_skip_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("driver.zip");
        fs::write(&path, "original").unwrap();

        match get_unique_path(&path, FileCollisionAction::Skip) {
            Err(Error::Install(InstallError::FileCollision { path: p, .. })) => {
                assert_eq!(p, path);
            }
            other => panic!("Expected FileCollision error, got {other:?}"),
        }

        let overwrite = get_unique_path(&path, FileCollisionAction::Overwrite).unwrap();
        assert_eq!(overwrite, path);
    }

    #[test]
    fn test_resolve_within_accepts_nested_paths() {
        let root = Path::new("/data/root");
        assert_eq!(
            resolve_within(root, Path::new("lib/libvulkan.so")),
            Some(root.join("lib").join("libvulkan.so"))
        );
        assert_eq!(
            resolve_within(root, Path::new("./meta.json")),
            Some(root.join("meta.json"))
        );
        assert_eq!(
            resolve_within(root, Path::new("a/b/../c")),
            Some(root.join("a").join("c"))
        );
    }

    #[test]
    fn test_resolve_within_rejects_escapes() {
        let root = Path::new("/data/root");
        assert_eq!(resolve_within(root, Path::new("../evil.so")), None);
        assert_eq!(resolve_within(root, Path::new("a/../../evil.so")), None);
        assert_eq!(resolve_within(root, Path::new("/etc/passwd")), None);
        assert_eq!(resolve_within(root, Path::new("")), None);
        assert_eq!(resolve_within(root, Path::new("a/..")), None);
    }

    #[test]
    fn test_copy_buffered_small_buffer_preserves_content() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut out = Vec::new();
        let copied = copy_buffered(&mut data.as_slice(), &mut out, 7).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_content_disposition_parsing() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"Turnip R18.zip\""),
            Some("Turnip R18.zip".to_string())
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename*=UTF-8''turnip%20v2.zip"),
            Some("turnip v2.zip".to_string())
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/releases/v1/Turnip-24.1.0.adpkg_R18.zip"),
            Some("Turnip-24.1.0.adpkg_R18.zip".to_string())
        );
        assert_eq!(filename_from_url("https://example.com/"), None);
        assert_eq!(filename_from_url("not a url"), None);
    }

    #[tokio::test]
    async fn test_extract_filename_from_response_prefers_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"mesa.zip\""),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/download", mock_server.uri());
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(extract_filename_from_response(&response, &url), "mesa.zip");
    }

    #[tokio::test]
    async fn test_extract_filename_from_response_falls_back_to_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/turnip.zip"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/files/turnip.zip", mock_server.uri());
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(extract_filename_from_response(&response, &url), "turnip.zip");
    }
}
