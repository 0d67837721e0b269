//! Document and filesystem I/O for cfgmig.
//!
//! Everything the merge engine and the proposal builder need from the outside
//! world goes through this crate:
//!
//! - [`load_json`] / [`write_json`] -- JSON documents with deterministic output
//!   (sorted keys, four-space indentation, ASCII-only escapes)
//! - [`list_dir`], [`files_equal`], [`copy_file`], [`copy_tree`] -- the
//!   directory primitives used when building a proposal tree
//!
//! # Design Rules
//!
//! 1. JSON output is rendered completely before the destination is touched.
//! 2. A missing path always surfaces as [`StoreError::NotFound`] with the path.
//! 3. File comparison is byte-for-byte, never metadata-only.

pub mod document;
pub mod error;
pub mod fs;

pub use document::{load_json, load_json_if_exists, to_canonical_string, write_json};
pub use error::{StoreError, StoreResult};
pub use fs::{
    copy_file, copy_tree, files_equal, is_dangling, list_dir, read_bytes, walk_tree, EntryKind, TreeCopy,
    WalkedEntry,
};
