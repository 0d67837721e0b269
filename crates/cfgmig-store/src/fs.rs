//! Filesystem primitives consumed by the diff and proposal crates.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

/// Chunk size used when comparing file contents.
const COMPARE_CHUNK: usize = 8 * 1024;

/// List the entry names of a directory, sorted.
pub fn list_dir(path: &Path) -> StoreResult<BTreeSet<OsString>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(path).map_err(|e| StoreError::io(path, e))? {
        let entry = entry.map_err(|e| StoreError::io(path, e))?;
        names.insert(entry.file_name());
    }
    Ok(names)
}

/// Read the full contents of a file.
pub fn read_bytes(path: &Path) -> StoreResult<Vec<u8>> {
    fs::read(path).map_err(|e| StoreError::io(path, e))
}

/// Copy a file byte-for-byte, creating the destination's parent directories.
///
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> StoreResult<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let copied = fs::copy(src, dst).map_err(|e| StoreError::io(src, e))?;
    debug!(src = %src.display(), dst = %dst.display(), bytes = copied, "copied file");
    Ok(copied)
}

/// Compare two files byte-for-byte.
///
/// Files of different length are unequal without reading their contents.
pub fn files_equal(left: &Path, right: &Path) -> StoreResult<bool> {
    let left_len = fs::metadata(left).map_err(|e| StoreError::io(left, e))?.len();
    let right_len = fs::metadata(right).map_err(|e| StoreError::io(right, e))?.len();
    if left_len != right_len {
        return Ok(false);
    }

    let mut left_reader = BufReader::new(File::open(left).map_err(|e| StoreError::io(left, e))?);
    let mut right_reader =
        BufReader::new(File::open(right).map_err(|e| StoreError::io(right, e))?);
    let mut left_buf = [0u8; COMPARE_CHUNK];
    let mut right_buf = [0u8; COMPARE_CHUNK];

    loop {
        let n = read_chunk(&mut left_reader, &mut left_buf).map_err(|e| StoreError::io(left, e))?;
        let m =
            read_chunk(&mut right_reader, &mut right_buf).map_err(|e| StoreError::io(right, e))?;
        if left_buf[..n] != right_buf[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as possible; a short count means end of file.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// What a walked entry resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// A symlink whose target does not exist.
    Dangling,
}

/// An entry found while walking a directory tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkedEntry {
    /// Path relative to the walk root.
    pub relative: PathBuf,
    pub kind: EntryKind,
}

/// Walk every entry below `root` (not including `root`), following symlinks.
///
/// Entries are returned parents-first with siblings sorted by name. A symlink
/// whose target is missing is reported as [`EntryKind::Dangling`] instead of
/// failing the walk.
pub fn walk_tree(root: &Path) -> StoreResult<Vec<WalkedEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let (path, kind) = match entry {
            Ok(entry) => {
                let kind = if entry.file_type().is_dir() { EntryKind::Dir } else { EntryKind::File };
                (entry.into_path(), kind)
            }
            Err(e) => match e.path().filter(|p| is_dangling(p)) {
                Some(path) => (path.to_path_buf(), EntryKind::Dangling),
                None => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    return Err(StoreError::io(&path, io::Error::from(e)));
                }
            },
        };
        let relative = path
            .strip_prefix(root)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .to_path_buf();
        entries.push(WalkedEntry { relative, kind });
    }
    Ok(entries)
}

/// Returns `true` if `path` is a symlink whose target does not resolve.
pub fn is_dangling(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok() && fs::metadata(path).is_err()
}

/// Outcome of [`copy_tree`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeCopy {
    /// Destination paths of the copied files.
    pub copied: Vec<PathBuf>,
    /// Source symlinks that were not copied because their target is missing.
    pub dangling: Vec<PathBuf>,
}

/// Copy every file under `src` to the same relative location under `dst`.
///
/// `keep` is asked about each source file; files it rejects are not copied.
/// Directories are created even when empty. Dangling symlinks are collected
/// rather than copied.
pub fn copy_tree<F>(src: &Path, dst: &Path, mut keep: F) -> StoreResult<TreeCopy>
where
    F: FnMut(&Path) -> bool,
{
    fs::create_dir_all(dst).map_err(|e| StoreError::io(dst, e))?;
    let mut outcome = TreeCopy::default();
    for entry in walk_tree(src)? {
        let from = src.join(&entry.relative);
        let to = dst.join(&entry.relative);
        match entry.kind {
            EntryKind::Dir => fs::create_dir_all(&to).map_err(|e| StoreError::io(&to, e))?,
            EntryKind::Dangling => {
                debug!(path = %from.display(), "dangling symlink not copied");
                outcome.dangling.push(from);
            }
            EntryKind::File => {
                if keep(&from) {
                    copy_file(&from, &to)?;
                    outcome.copied.push(to);
                }
            }
        }
    }
    Ok(outcome)
}
