use std::fmt;
use std::path::PathBuf;

/// The plan step a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    LogDifferences,
    CopyDirectory,
    CopyFile,
    DiffDirectory,
    DiffFile,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::LogDifferences => "log-differences",
            Step::CopyDirectory => "copy-directory",
            Step::CopyFile => "copy-file",
            Step::DiffDirectory => "diff-directory",
            Step::DiffFile => "diff-file",
        };
        f.write_str(name)
    }
}

/// A step that could not run because its old-side path is missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialSkip {
    pub step: Step,
    pub old: PathBuf,
}

/// Everything a proposal run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProposalReport {
    /// Destination paths of copied files, in copy order.
    pub copied: Vec<PathBuf>,
    /// Old-side files a copy was suppressed for.
    pub blacklisted: Vec<PathBuf>,
    pub skipped: Vec<PartialSkip>,
    /// Old-side symlinks whose target is missing; they are not copied.
    pub dangling: Vec<PathBuf>,
    /// Documents written by the configuration merge.
    pub generated: Vec<PathBuf>,
}

impl ProposalReport {
    /// Returns `true` if nothing was written to the proposal tree.
    pub fn is_empty(&self) -> bool {
        self.copied.is_empty() && self.generated.is_empty()
    }
}
