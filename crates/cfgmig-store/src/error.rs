use std::io;
use std::path::{Path, PathBuf};

/// Errors from document and filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required file or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but does not contain valid JSON.
    #[error("malformed JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// I/O error while reading or writing a path.
    #[error("I/O error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// A value could not be rendered as JSON text.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Attach `path` to an I/O error, mapping `NotFound` to [`StoreError::NotFound`].
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
