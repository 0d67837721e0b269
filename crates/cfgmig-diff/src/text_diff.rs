//! Changed-file rendering: line-by-line comparison of file contents.
//!
//! Uses the `similar` crate (Myers diff algorithm) to render unified diffs
//! with three lines of context.

use std::path::Path;

use cfgmig_store::read_bytes;
use similar::{ChangeTag, TextDiff};

use crate::error::DiffResult;

/// Lines of context around each hunk.
const CONTEXT_RADIUS: usize = 3;

/// The result of comparing two files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileDiff {
    /// Contents are byte-for-byte equal.
    Identical,
    /// At least one side is not valid UTF-8.
    Binary { old_len: usize, new_len: usize },
    /// Both sides are text and differ.
    Text {
        unified: String,
        added: usize,
        removed: usize,
    },
}

impl FileDiff {
    /// Returns `true` if the two sides are identical.
    pub fn is_empty(&self) -> bool {
        matches!(self, FileDiff::Identical)
    }

    /// Human-readable rendering, suitable for a log line.
    pub fn render(&self) -> String {
        match self {
            FileDiff::Identical => String::new(),
            FileDiff::Binary { old_len, new_len } => {
                format!("binary files differ ({old_len} bytes -> {new_len} bytes)")
            }
            FileDiff::Text { unified, .. } => unified.clone(),
        }
    }
}

/// Compare two byte slices, labelling the unified header with `old_name`
/// and `new_name`.
pub fn diff_bytes(old: &[u8], new: &[u8], old_name: &str, new_name: &str) -> FileDiff {
    if old == new {
        return FileDiff::Identical;
    }

    let (Ok(old_str), Ok(new_str)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return FileDiff::Binary {
            old_len: old.len(),
            new_len: new.len(),
        };
    };

    let text_diff = TextDiff::from_lines(old_str, new_str);

    let mut added = 0;
    let mut removed = 0;
    for change in text_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let unified = text_diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(old_name, new_name)
        .to_string();

    FileDiff::Text {
        unified,
        added,
        removed,
    }
}

/// Read and compare two files on disk.
pub fn diff_files_on_disk(old: &Path, new: &Path) -> DiffResult<FileDiff> {
    let old_bytes = read_bytes(old)?;
    let new_bytes = read_bytes(new)?;
    Ok(diff_bytes(
        &old_bytes,
        &new_bytes,
        &old.display().to_string(),
        &new.display().to_string(),
    ))
}
