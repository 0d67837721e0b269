//! Directory-level diff: compare two trees entry by entry.
//!
//! The comparison is computed eagerly and bottom-up into a
//! [`DirectoryDiffNode`]; nothing is evaluated lazily, so walking the result
//! any number of times sees the same classification.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use cfgmig_store::{files_equal, list_dir};
use tracing::{debug, warn};

use crate::error::{DiffError, DiffResult};

/// Names never compared, on either side.
pub const DEFAULT_IGNORES: [&str; 8] = [
    "RCS",
    "CVS",
    "tags",
    ".git",
    ".hg",
    ".bzr",
    "_darcs",
    "__pycache__",
];

/// Comparison of one left directory with one right directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryDiffNode {
    left: PathBuf,
    right: PathBuf,
    same: BTreeSet<OsString>,
    diff_files: BTreeSet<OsString>,
    left_only: BTreeSet<OsString>,
    right_only: BTreeSet<OsString>,
    subdirs: BTreeMap<OsString, DirectoryDiffNode>,
}

impl DirectoryDiffNode {
    /// The left (old) directory.
    pub fn left(&self) -> &Path {
        &self.left
    }

    /// The right (new) directory.
    pub fn right(&self) -> &Path {
        &self.right
    }

    /// Files present on both sides with identical bytes.
    pub fn same(&self) -> &BTreeSet<OsString> {
        &self.same
    }

    /// Entries present on both sides whose content or kind differs.
    pub fn diff_files(&self) -> &BTreeSet<OsString> {
        &self.diff_files
    }

    /// Entries present only on the left.
    pub fn left_only(&self) -> &BTreeSet<OsString> {
        &self.left_only
    }

    /// Entries present only on the right.
    pub fn right_only(&self) -> &BTreeSet<OsString> {
        &self.right_only
    }

    /// Child comparisons for directories present on both sides.
    pub fn subdirs(&self) -> &BTreeMap<OsString, DirectoryDiffNode> {
        &self.subdirs
    }

    /// This node and every descendant, parents before children.
    pub fn walk(&self) -> Vec<&DirectoryDiffNode> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.subdirs.values().rev());
        }
        nodes
    }

    /// Returns `true` if nothing differs anywhere in the tree.
    pub fn is_identical(&self) -> bool {
        self.walk().iter().all(|node| {
            node.diff_files.is_empty() && node.left_only.is_empty() && node.right_only.is_empty()
        })
    }

    /// `(left, right)` path pairs for every changed entry in the tree.
    pub fn changed_paths(&self) -> Vec<(PathBuf, PathBuf)> {
        self.walk()
            .into_iter()
            .flat_map(|node| {
                node.diff_files
                    .iter()
                    .map(|name| (node.left.join(name), node.right.join(name)))
            })
            .collect()
    }

    /// Left-side paths of every entry only the left tree has.
    pub fn left_only_paths(&self) -> Vec<PathBuf> {
        self.walk()
            .into_iter()
            .flat_map(|node| node.left_only.iter().map(|name| node.left.join(name)))
            .collect()
    }

    /// Right-side paths of every entry only the right tree has.
    pub fn right_only_paths(&self) -> Vec<PathBuf> {
        self.walk()
            .into_iter()
            .flat_map(|node| node.right_only.iter().map(|name| node.right.join(name)))
            .collect()
    }

    /// Entry counts summed over the whole tree.
    pub fn summary(&self) -> DiffSummary {
        self.walk()
            .into_iter()
            .fold(DiffSummary::default(), |acc, node| DiffSummary {
                same: acc.same + node.same.len(),
                changed: acc.changed + node.diff_files.len(),
                left_only: acc.left_only + node.left_only.len(),
                right_only: acc.right_only + node.right_only.len(),
            })
    }
}

/// Entry counts for a directory comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub same: usize,
    pub changed: usize,
    pub left_only: usize,
    pub right_only: usize,
}

/// Builds [`DirectoryDiffNode`] trees.
#[derive(Clone, Debug)]
pub struct DirectoryDiffer {
    ignore: BTreeSet<OsString>,
}

impl Default for DirectoryDiffer {
    fn default() -> Self {
        Self::with_ignores(DEFAULT_IGNORES)
    }
}

impl DirectoryDiffer {
    /// A differ that skips the given names at every level.
    pub fn with_ignores<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self {
            ignore: names.into_iter().map(|n| n.as_ref().to_os_string()).collect(),
        }
    }

    /// Compare `left` with `right`.
    ///
    /// `left` must be an existing directory. A missing `right` is an empty
    /// tree, so every left entry becomes left-only.
    pub fn diff(&self, left: &Path, right: &Path) -> DiffResult<DirectoryDiffNode> {
        if !left.exists() {
            return Err(DiffError::NotFound(left.to_path_buf()));
        }
        if !left.is_dir() {
            return Err(DiffError::NotADirectory(left.to_path_buf()));
        }
        if !right.is_dir() {
            debug!(right = %right.display(), "right directory absent; treating every entry as left-only");
        }
        self.build(left, right)
    }

    fn build(&self, left: &Path, right: &Path) -> DiffResult<DirectoryDiffNode> {
        let left_names = self.names(left)?;
        let right_names = if right.is_dir() {
            self.names(right)?
        } else {
            BTreeSet::new()
        };

        let mut node = DirectoryDiffNode {
            left: left.to_path_buf(),
            right: right.to_path_buf(),
            ..Default::default()
        };

        for name in &left_names {
            if !right_names.contains(name) {
                node.left_only.insert(name.clone());
                continue;
            }

            let left_path = left.join(name);
            let right_path = right.join(name);
            let (Some(left_kind), Some(right_kind)) = (kind(&left_path), kind(&right_path)) else {
                continue;
            };

            match (left_kind, right_kind) {
                (Kind::Dir, Kind::Dir) => {
                    let child = self.build(&left_path, &right_path)?;
                    node.subdirs.insert(name.clone(), child);
                }
                (Kind::File, Kind::File) => {
                    if files_equal(&left_path, &right_path)? {
                        node.same.insert(name.clone());
                    } else {
                        debug!(left = %left_path.display(), "content differs");
                        node.diff_files.insert(name.clone());
                    }
                }
                _ => {
                    debug!(left = %left_path.display(), "entry kind differs");
                    node.diff_files.insert(name.clone());
                }
            }
        }

        node.right_only = right_names.difference(&left_names).cloned().collect();
        Ok(node)
    }

    fn names(&self, dir: &Path) -> DiffResult<BTreeSet<OsString>> {
        let mut names = list_dir(dir)?;
        names.retain(|name| !self.ignore.contains(name));
        Ok(names)
    }
}

/// Compare two directory trees with the default ignore list.
pub fn diff_directories(left: &Path, right: &Path) -> DiffResult<DirectoryDiffNode> {
    DirectoryDiffer::default().diff(left, right)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
}

fn kind(path: &Path) -> Option<Kind> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Some(Kind::Dir),
        Ok(_) => Some(Kind::File),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot stat entry; skipping");
            None
        }
    }
}
