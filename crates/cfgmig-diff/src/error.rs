//! Error types for the diff crate.

use std::path::PathBuf;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The left-hand directory does not exist.
    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The left-hand path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Listing, reading or comparing an entry failed.
    #[error("store error: {0}")]
    Store(#[from] cfgmig_store::StoreError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
