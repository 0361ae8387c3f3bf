//! Reading and validating input files

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::InputConfig;

/// A file rejected before analysis
#[derive(Debug, Error)]
pub enum InputError {
    #[error("{}: unsupported file type (expected one of: {expected})", path.display())]
    UnsupportedExtension { path: PathBuf, expected: String },

    #[error("{}: file is {size} bytes, limit is {limit}", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{}: file is empty", path.display())]
    Empty { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Validates and reads log files
#[derive(Debug, Clone)]
pub struct InputReader {
    config: InputConfig,
}

impl InputReader {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Check the extension, then the size, then read the bytes
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, InputError> {
        self.check_extension(path)?;

        let io_err = |source| InputError::Io {
            path: path.to_path_buf(),
            source,
        };
        let meta = tokio::fs::metadata(path).await.map_err(io_err)?;
        self.check_size(path, meta.len())?;

        let bytes = tokio::fs::read(path).await.map_err(io_err)?;
        // the file may have changed between the two calls
        self.check_size(path, bytes.len() as u64)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read input");
        Ok(bytes)
    }

    fn check_extension(&self, path: &Path) -> Result<(), InputError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if self
            .config
            .extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        {
            return Ok(());
        }
        Err(InputError::UnsupportedExtension {
            path: path.to_path_buf(),
            expected: self.config.extensions.join(", "),
        })
    }

    fn check_size(&self, path: &Path, size: u64) -> Result<(), InputError> {
        if size == 0 {
            return Err(InputError::Empty {
                path: path.to_path_buf(),
            });
        }
        if size > self.config.max_bytes {
            return Err(InputError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.config.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn reader() -> InputReader {
        InputReader::new(InputConfig::default())
    }

    #[tokio::test]
    async fn test_reads_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.LOG");
        fs::write(&path, "ERROR: boom\n").unwrap();

        let bytes = reader().read(&path).await.unwrap();
        assert_eq!(bytes, b"ERROR: boom\n");
    }

    #[tokio::test]
    async fn test_rejects_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.csv");
        fs::write(&path, "a,b").unwrap();

        let err = reader().read(&path).await.unwrap_err();
        assert!(matches!(err, InputError::UnsupportedExtension { .. }));
        assert!(err.to_string().contains("log, txt"));
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        let err = reader().read(&path).await.unwrap_err();
        assert!(matches!(err, InputError::Empty { .. }));
    }

    #[tokio::test]
    async fn test_rejects_large_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.log");
        fs::write(&path, "x".repeat(64)).unwrap();

        let reader = InputReader::new(InputConfig {
            max_bytes: 32,
            ..InputConfig::default()
        });
        let err = reader.read(&path).await.unwrap_err();
        assert!(matches!(err, InputError::TooLarge { size: 64, limit: 32, .. }));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = reader().read(&dir.path().join("gone.log")).await.unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
    }
}
