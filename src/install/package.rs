use crate::error::{Error, InstallError, Result};
use std::io::Read;
use std::path::Path;

/// A candidate driver package: a byte stream and the name it was offered under
pub struct PackageSource {
    reader: Box<dyn Read + Send>,
    file_name: String,
    total_bytes: Option<u64>,
}

impl PackageSource {
    /// Wrap any readable stream
    pub fn from_reader(reader: impl Read + Send + 'static, file_name: impl Into<String>) -> Self {
        Self {
            reader: Box::new(reader),
            file_name: file_name.into(),
            total_bytes: None,
        }
    }

    /// Open a file picked by the user
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let total = file.metadata().ok().map(|m| m.len());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Install(InstallError::InvalidFileName {
                    name: path.display().to_string(),
                    reason: "path has no file name".to_string(),
                })
            })?;
        Ok(Self {
            reader: Box::new(file),
            file_name,
            total_bytes: total,
        })
    }

    /// Declare the stream length
    pub fn with_total_bytes(mut self, total: u64) -> Self {
        self.total_bytes = Some(total);
        self
    }

    /// Suggested file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Declared stream length, if known
    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    pub(crate) fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }
}

impl std::fmt::Debug for PackageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageSource")
            .field("file_name", &self.file_name)
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

/// Reduce a suggested name to a plain file name usable in driver storage
///
/// Directory parts (either separator) are dropped. Empty names, `.`/`..`,
/// hidden names and names with control characters are refused.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let invalid = |reason: &str| {
        Error::Install(InstallError::InvalidFileName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(invalid("no usable file name"));
    }
    if base.starts_with('.') {
        return Err(invalid("hidden file names are reserved"));
    }
    if base.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }

    Ok(base.to_string())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(
            sanitize_file_name("/storage/emulated/0/Download/turnip.zip").unwrap(),
            "turnip.zip"
        );
        assert_eq!(
            sanitize_file_name("..\\..\\Turnip R18.zip").unwrap(),
            "Turnip R18.zip"
        );
    }

    #[test]
    fn test_sanitize_rejects_unusable_names() {
        for name in ["", "  ", ".", "..", "dir/", "../..", ".hidden.zip", "a\u{0}b.zip"] {
            let err = sanitize_file_name(name).unwrap_err();
            assert_eq!(err.error_code(), "invalid_file_name", "{name:?}");
        }
    }

    #[test]
    fn test_from_path_records_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turnip.zip");
        std::fs::write(&path, b"12345").unwrap();

        let source = PackageSource::from_path(&path).unwrap();
        assert_eq!(source.file_name(), "turnip.zip");
        assert_eq!(source.total_bytes(), Some(5));

        let mut data = Vec::new();
        source.into_reader().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"12345");
    }

    #[test]
    fn test_from_reader() {
        let source = PackageSource::from_reader(std::io::Cursor::new(vec![1, 2]), "x.zip")
            .with_total_bytes(2);
        assert_eq!(source.file_name(), "x.zip");
        assert_eq!(source.total_bytes(), Some(2));
    }
}
