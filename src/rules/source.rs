//! Where rule snapshots come from.

use std::path::{Path, PathBuf};

use crate::rules::error::SourceError;

/// Delivers the latest complete rule blob.
///
/// Implementations own their own fetch, caching and retry policy; the
/// reload pipeline only reacts to whatever bytes come back.
pub trait RuleSource: Send + Sync + std::fmt::Debug {
    fn fetch(&self) -> Result<Vec<u8>, SourceError>;
}

/// Reads the rule blob from a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileSource {
    fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        std::fs::read(&self.path).map_err(|source| SourceError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_source_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"gray.v1=auth:10.0.0.1 <= user:1\n").unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.fetch().unwrap(), b"gray.v1=auth:10.0.0.1 <= user:1\n");
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("absent.properties"));
        assert!(matches!(source.fetch(), Err(SourceError::Io { .. })));
    }
}
