//! Diff engine for cfgmig.
//!
//! Compares an old installation tree with a new one and renders the
//! content changes of individual files.
//!
//! # Key Types
//!
//! - [`DirectoryDiffNode`] / [`DirectoryDiffer`] -- Recursive directory comparison
//! - [`FileDiff`] -- Unified diff of a changed file

pub mod dir_diff;
pub mod error;
pub mod text_diff;

pub use dir_diff::{diff_directories, DiffSummary, DirectoryDiffNode, DirectoryDiffer, DEFAULT_IGNORES};
pub use error::{DiffError, DiffResult};
pub use text_diff::{diff_bytes, diff_files_on_disk, FileDiff};
