//! Proposal assembly.
//!
//! A [`ProposalBuilder`] walks the steps of a [`ProposalPlan`] and copies
//! into the proposed tree exactly the old-side files the new installation
//! lacks or has changed. Neither the old nor the new tree is modified.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use cfgmig_diff::{diff_files_on_disk, DirectoryDiffNode, DirectoryDiffer};
use cfgmig_merge::MergeEngine;
use cfgmig_store::{
    copy_file, copy_tree, files_equal, is_dangling, load_json, load_json_if_exists, read_bytes, write_json,
    StoreError,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ProposalError, ProposalResult};
use crate::plan::{ConfigMergeSpec, PathTriple, ProposalPlan, Roots, VersionFile};
use crate::report::{PartialSkip, ProposalReport, Step};

/// Merge an existing configuration document with a template and remove the
/// entries named by an optional blacklist document.
///
/// Missing `existing` or `template` documents are errors. A blacklist
/// document that does not exist is ignored with a warning.
pub fn merge_config_documents(
    engine: &MergeEngine,
    existing: &Path,
    template: &Path,
    blacklist: Option<&Path>,
) -> ProposalResult<Value> {
    let existing_doc = load_json(existing)?;
    let template_doc = load_json(template)?;
    let merged = engine.add_list_unique_elements(&existing_doc, &template_doc)?;

    let Some(path) = blacklist else {
        return Ok(merged);
    };
    match load_json_if_exists(path)? {
        Some(blacklist_doc) => {
            debug!(blacklist = %path.display(), "subtracting blacklist document");
            Ok(engine.difference(&merged, &blacklist_doc)?)
        }
        None => {
            warn!(blacklist = %path.display(), "blacklist document not found; ignoring");
            Ok(merged)
        }
    }
}

/// Builds one proposal tree from a plan.
pub struct ProposalBuilder {
    plan: ProposalPlan,
    engine: MergeEngine,
    differ: DirectoryDiffer,
    roots: Roots,
    blacklist: BTreeSet<PathBuf>,
    config_blacklist: Option<PathBuf>,
    show_diffs: bool,
}

impl ProposalBuilder {
    pub fn new(plan: ProposalPlan, engine: MergeEngine, roots: Roots) -> Self {
        let blacklist = plan.blacklist.iter().map(|t| t.render(&roots)).collect();
        Self {
            plan,
            engine,
            differ: DirectoryDiffer::default(),
            roots,
            blacklist,
            config_blacklist: None,
            show_diffs: false,
        }
    }

    /// Blacklist document subtracted from the merged configuration.
    pub fn with_config_blacklist(mut self, path: Option<PathBuf>) -> Self {
        self.config_blacklist = path;
        self
    }

    /// Log a unified diff of every changed text file at DEBUG.
    pub fn with_show_diffs(mut self, show: bool) -> Self {
        self.show_diffs = show;
        self
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Run every step of the plan in order.
    pub fn build(&self) -> ProposalResult<ProposalReport> {
        let proposed = &self.roots.proposed;
        fs::create_dir_all(proposed).map_err(|e| StoreError::io(proposed, e))?;
        info!(
            old = %self.roots.old.display(),
            new = %self.roots.new.display(),
            proposed = %proposed.display(),
            "building proposal"
        );

        let mut report = ProposalReport::default();

        for version in &self.plan.version_files {
            self.log_version(version);
        }
        for triple in &self.plan.log_differences {
            self.log_differences(triple, &mut report)?;
        }
        for triple in &self.plan.copy_directories {
            self.copy_directory(triple, &mut report)?;
        }
        for triple in &self.plan.copy_files {
            self.copy_file_if_exists(triple, &mut report)?;
        }
        for triple in &self.plan.diff_directories {
            self.diff_directory(triple, &mut report)?;
        }
        for triple in &self.plan.diff_files {
            self.diff_file(triple, &mut report)?;
        }
        if let Some(merge) = &self.plan.config_merge {
            self.merge_config(merge, &mut report)?;
        }

        info!(
            copied = report.copied.len(),
            blacklisted = report.blacklisted.len(),
            skipped = report.skipped.len(),
            dangling = report.dangling.len(),
            generated = report.generated.len(),
            "proposal complete"
        );
        Ok(report)
    }

    fn log_version(&self, version: &VersionFile) {
        let path = version.path.render(&self.roots);
        match read_bytes(&path) {
            Ok(bytes) => {
                for line in String::from_utf8_lossy(&bytes).lines() {
                    info!(label = %version.label, file = %path.display(), "{}", line.trim());
                }
            }
            Err(e) => warn!(label = %version.label, file = %path.display(), error = %e, "cannot read version file"),
        }
    }

    fn log_differences(&self, triple: &PathTriple, report: &mut ProposalReport) -> ProposalResult<()> {
        let paths = triple.render(&self.roots);
        if !paths.old.is_dir() {
            skip(report, Step::LogDifferences, paths.old);
            return Ok(());
        }

        let node = self.differ.diff(&paths.old, &paths.new)?;
        let summary = node.summary();
        info!(
            old = %paths.old.display(),
            new = %paths.new.display(),
            identical = node.is_identical(),
            same = summary.same,
            changed = summary.changed,
            old_only = summary.left_only,
            new_only = summary.right_only,
            "differences"
        );
        for path in node.left_only_paths() {
            info!(path = %path.display(), "old-only");
        }
        for path in node.right_only_paths() {
            info!(path = %path.display(), "new-only");
        }
        for (old, new) in node.changed_paths() {
            info!(old = %old.display(), new = %new.display(), "changed");
        }
        Ok(())
    }

    /// copy-whole-directory: the old subtree lands at the proposed path.
    fn copy_directory(&self, triple: &PathTriple, report: &mut ProposalReport) -> ProposalResult<()> {
        let paths = triple.render(&self.roots);
        if !paths.old.is_dir() {
            skip(report, Step::CopyDirectory, paths.old);
            return Ok(());
        }
        if paths.proposed.exists() {
            return Err(ProposalError::DestinationExists(paths.proposed));
        }
        info!(old = %paths.old.display(), proposed = %paths.proposed.display(), "copy-tree");
        self.copy_subtree(&paths.old, &paths.proposed, report)
    }

    /// copy-if-old-exists.
    fn copy_file_if_exists(&self, triple: &PathTriple, report: &mut ProposalReport) -> ProposalResult<()> {
        let paths = triple.render(&self.roots);
        if !paths.old.is_file() {
            skip(report, Step::CopyFile, paths.old);
            return Ok(());
        }
        self.copy_one(&paths.old, &paths.proposed, report)
    }

    /// diff-and-copy-directory-recursive.
    fn diff_directory(&self, triple: &PathTriple, report: &mut ProposalReport) -> ProposalResult<()> {
        let paths = triple.render(&self.roots);
        if !paths.old.is_dir() {
            skip(report, Step::DiffDirectory, paths.old);
            return Ok(());
        }
        let node = self.differ.diff(&paths.old, &paths.new)?;
        self.handle_directory_diff(&node, &paths.proposed, report)
    }

    /// Copy every changed and old-only entry of `node` below `proposed`,
    /// then descend into the common subdirectories.
    ///
    /// The destination of an entry is its position relative to the node's
    /// right side, re-rooted at `proposed`.
    pub fn handle_directory_diff(
        &self,
        node: &DirectoryDiffNode,
        proposed: &Path,
        report: &mut ProposalReport,
    ) -> ProposalResult<()> {
        for name in node.diff_files().iter().chain(node.left_only()) {
            let old = node.left().join(name);
            let dest = proposed.join(name);
            if old.is_dir() {
                info!(old = %old.display(), proposed = %dest.display(), "copy-tree");
                self.copy_subtree(&old, &dest, report)?;
            } else {
                let new = node.right().join(name);
                if self.show_diffs && old.is_file() && new.is_file() {
                    self.log_file_diff(&old, &new);
                }
                self.copy_one(&old, &dest, report)?;
            }
        }

        for (name, child) in node.subdirs() {
            self.handle_directory_diff(child, &proposed.join(name), report)?;
        }
        Ok(())
    }

    /// diff-and-copy-changed-files.
    fn diff_file(&self, triple: &PathTriple, report: &mut ProposalReport) -> ProposalResult<()> {
        let paths = triple.render(&self.roots);
        if !paths.old.is_file() {
            skip(report, Step::DiffFile, paths.old);
            return Ok(());
        }
        if paths.new.is_file() {
            if files_equal(&paths.old, &paths.new)? {
                debug!(old = %paths.old.display(), "unchanged");
                return Ok(());
            }
            if self.show_diffs {
                self.log_file_diff(&paths.old, &paths.new);
            }
        }
        self.copy_one(&paths.old, &paths.proposed, report)
    }

    fn merge_config(&self, merge: &ConfigMergeSpec, report: &mut ProposalReport) -> ProposalResult<()> {
        let existing = merge.existing.render(&self.roots);
        let template = merge.template.render(&self.roots);
        let output = merge.output.render(&self.roots);

        let merged = merge_config_documents(
            &self.engine,
            &existing,
            &template,
            self.config_blacklist.as_deref(),
        )?;
        write_json(&output, &merged)?;
        info!(path = %output.display(), "make-file");
        report.generated.push(output);
        Ok(())
    }

    fn copy_one(&self, old: &Path, dest: &Path, report: &mut ProposalReport) -> ProposalResult<()> {
        if self.blacklist.contains(old) {
            info!(path = %old.display(), "blacklisted; not copied");
            report.blacklisted.push(old.to_path_buf());
            return Ok(());
        }
        if is_dangling(old) {
            dangling(report, old.to_path_buf());
            return Ok(());
        }
        copy_file(old, dest)?;
        info!(old = %old.display(), proposed = %dest.display(), "copy-file");
        report.copied.push(dest.to_path_buf());
        Ok(())
    }

    fn copy_subtree(&self, old: &Path, dest: &Path, report: &mut ProposalReport) -> ProposalResult<()> {
        let blacklisted = &mut report.blacklisted;
        let outcome = copy_tree(old, dest, |path| {
            if self.blacklist.contains(path) {
                info!(path = %path.display(), "blacklisted; not copied");
                blacklisted.push(path.to_path_buf());
                false
            } else {
                true
            }
        })?;
        report.copied.extend(outcome.copied);
        for path in outcome.dangling {
            dangling(report, path);
        }
        Ok(())
    }

    fn log_file_diff(&self, old: &Path, new: &Path) {
        match diff_files_on_disk(old, new) {
            Ok(diff) if diff.is_empty() => debug!(old = %old.display(), "no content change"),
            Ok(diff) => debug!(old = %old.display(), new = %new.display(), "\n{}", diff.render()),
            Err(e) => warn!(old = %old.display(), error = %e, "cannot render diff"),
        }
    }
}

fn skip(report: &mut ProposalReport, step: Step, old: PathBuf) {
    warn!(%step, path = %old.display(), "old path does not exist; skipping");
    report.skipped.push(PartialSkip { step, old });
}

fn dangling(report: &mut ProposalReport, old: PathBuf) {
    warn!(path = %old.display(), "symlink target does not exist; not copied");
    report.dangling.push(old);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgmig_merge::UniqueKeyRegistry;
    use serde_json::json;
    use std::collections::BTreeMap;

    use crate::plan::PathTemplate;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn dsrc_engine() -> MergeEngine {
        let mut entries = BTreeMap::new();
        entries.insert("CFG_DSRC".to_string(), vec![vec!["DSRC_CODE".to_string()]]);
        MergeEngine::new(UniqueKeyRegistry::new(entries).unwrap())
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        roots: Roots,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let roots = Roots::new(
            dir.path().join("old"),
            dir.path().join("new"),
            dir.path().join("proposed"),
        );
        fs::create_dir_all(&roots.old).unwrap();
        fs::create_dir_all(&roots.new).unwrap();
        Fixture { _dir: dir, roots }
    }

    fn plan_with(diff_directories: Vec<PathTriple>) -> ProposalPlan {
        ProposalPlan {
            diff_directories,
            ..ProposalPlan::empty()
        }
    }

    #[test]
    fn proposes_only_old_only_file() {
        let f = fixture();
        write(&f.roots.old.join("a.txt"), "1");
        write(&f.roots.old.join("b.txt"), "2");
        write(&f.roots.new.join("a.txt"), "1");
        write(&f.roots.new.join("c.txt"), "3");

        let plan = plan_with(vec![PathTriple::new("{old}", "{new}", "{proposed}")]);
        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .build()
            .unwrap();

        assert_eq!(report.copied, vec![f.roots.proposed.join("b.txt")]);
        assert_eq!(fs::read_to_string(f.roots.proposed.join("b.txt")).unwrap(), "2");
        assert!(!f.roots.proposed.join("a.txt").exists());
        assert!(!f.roots.proposed.join("c.txt").exists());
    }

    #[test]
    fn nested_changes_keep_relative_location() {
        let f = fixture();
        write(&f.roots.old.join("g2/python/lib/custom.py"), "mine");
        write(&f.roots.new.join("g2/python/lib/custom.py"), "theirs");
        write(&f.roots.old.join("g2/python/lib/extra/tool.py"), "tool");
        write(&f.roots.old.join("g2/python/lib/extra/deeper/x.cfg"), "x");
        fs::create_dir_all(f.roots.new.join("g2/python/lib")).unwrap();

        let plan = plan_with(vec![PathTriple::mirrored("g2/python")]);
        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .with_show_diffs(true)
            .build()
            .unwrap();

        let base = f.roots.proposed.join("g2/python/lib");
        assert_eq!(fs::read_to_string(base.join("custom.py")).unwrap(), "mine");
        assert_eq!(fs::read_to_string(base.join("extra/tool.py")).unwrap(), "tool");
        assert_eq!(fs::read_to_string(base.join("extra/deeper/x.cfg")).unwrap(), "x");
        assert_eq!(report.copied.len(), 3);
    }

    #[test]
    fn blacklist_suppresses_copies() {
        let f = fixture();
        write(&f.roots.old.join("g2/python/G2Loader.py"), "legacy");
        write(&f.roots.old.join("g2/python/mine.py"), "keep");
        write(&f.roots.old.join("g2/python/old_pkg/G2Loader.py"), "nested");
        fs::create_dir_all(f.roots.new.join("g2/python")).unwrap();

        let mut plan = plan_with(vec![PathTriple::mirrored("g2/python")]);
        plan.blacklist = vec![
            PathTemplate::new("{old}/g2/python/G2Loader.py"),
            PathTemplate::new("{old}/g2/python/old_pkg/G2Loader.py"),
        ];
        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .build()
            .unwrap();

        assert_eq!(report.copied, vec![f.roots.proposed.join("g2/python/mine.py")]);
        assert_eq!(
            report.blacklisted,
            vec![
                f.roots.old.join("g2/python/G2Loader.py"),
                f.roots.old.join("g2/python/old_pkg/G2Loader.py"),
            ]
        );
        assert!(!f.roots.proposed.join("g2/python/G2Loader.py").exists());
        assert!(f.roots.proposed.join("g2/python/old_pkg").is_dir());
    }

    #[test]
    fn missing_old_paths_are_partial_skips() {
        let f = fixture();
        let plan = ProposalPlan {
            copy_files: vec![PathTriple::mirrored("nope.txt")],
            diff_directories: vec![PathTriple::mirrored("absent")],
            diff_files: vec![PathTriple::mirrored("g2/setupEnv")],
            ..ProposalPlan::empty()
        };

        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .build()
            .unwrap();

        let steps: Vec<Step> = report.skipped.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![Step::CopyFile, Step::DiffDirectory, Step::DiffFile]);
        assert!(report.is_empty());
        assert!(f.roots.proposed.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_do_not_stop_the_run() {
        use std::os::unix::fs::symlink;

        let f = fixture();
        let nowhere = f.roots.old.join("nonexistent/target");
        write(&f.roots.old.join("g2/python/a_custom.py"), "a");
        symlink(&nowhere, f.roots.old.join("g2/python/broken.so")).unwrap();
        write(&f.roots.old.join("g2/python/z_custom.py"), "z");
        fs::create_dir_all(f.roots.new.join("g2/python")).unwrap();
        write(&f.roots.old.join("resources/ok.txt"), "ok");
        fs::create_dir_all(f.roots.old.join("resources/sub")).unwrap();
        symlink(&nowhere, f.roots.old.join("resources/sub/broken.lnk")).unwrap();
        write(&f.roots.old.join("g2/setupEnv"), "export A=1\n");

        let plan = ProposalPlan {
            copy_directories: vec![PathTriple::mirrored("resources")],
            diff_directories: vec![PathTriple::mirrored("g2/python")],
            diff_files: vec![PathTriple::mirrored("g2/setupEnv")],
            ..ProposalPlan::empty()
        };
        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .build()
            .unwrap();

        assert_eq!(
            report.dangling,
            vec![
                f.roots.old.join("resources/sub/broken.lnk"),
                f.roots.old.join("g2/python/broken.so"),
            ]
        );
        assert_eq!(
            report.copied,
            vec![
                f.roots.proposed.join("resources/ok.txt"),
                f.roots.proposed.join("g2/python/a_custom.py"),
                f.roots.proposed.join("g2/python/z_custom.py"),
                f.roots.proposed.join("g2/setupEnv"),
            ]
        );
        assert!(f.roots.proposed.join("resources/sub").is_dir());
        assert!(!f.roots.proposed.join("g2/python/broken.so").exists());
    }

    #[test]
    fn diff_files_copies_changed_or_new_absent() {
        let f = fixture();
        write(&f.roots.old.join("g2/setupEnv"), "export A=1\n");
        write(&f.roots.new.join("g2/setupEnv"), "export A=2\n");
        write(&f.roots.old.join("g2/data/g2.lic"), "same");
        write(&f.roots.new.join("g2/data/g2.lic"), "same");
        write(&f.roots.old.join("g2/sqldb/G2C.db"), "db");

        let plan = ProposalPlan {
            diff_files: ProposalPlan::default().diff_files,
            ..ProposalPlan::empty()
        };
        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .with_show_diffs(true)
            .build()
            .unwrap();

        assert_eq!(
            report.copied,
            vec![
                f.roots.proposed.join("g2/setupEnv"),
                f.roots.proposed.join("g2/sqldb/G2C.db"),
            ]
        );
        assert!(!f.roots.proposed.join("g2/data/g2.lic").exists());
    }

    #[test]
    fn copy_directory_refuses_existing_destination() {
        let f = fixture();
        write(&f.roots.old.join("resources/a"), "a");
        write(&f.roots.old.join("resources/sub/b"), "b");

        let plan = ProposalPlan {
            copy_directories: vec![PathTriple::mirrored("resources")],
            ..ProposalPlan::empty()
        };
        let builder = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone());

        let report = builder.build().unwrap();
        assert_eq!(report.copied.len(), 2);
        assert_eq!(
            fs::read_to_string(f.roots.proposed.join("resources/sub/b")).unwrap(),
            "b"
        );

        let err = builder.build().unwrap_err();
        assert!(matches!(err, ProposalError::DestinationExists(p) if p == f.roots.proposed.join("resources")));
    }

    #[test]
    fn config_merge_with_blacklist() {
        let f = fixture();
        write(
            &f.roots.old.join("g2/python/g2config.json"),
            r#"{"G2_CONFIG":{"CFG_DSRC":[{"DSRC_CODE":"X"}]}}"#,
        );
        write(
            &f.roots.new.join("g2/data/g2config.json"),
            r#"{"G2_CONFIG":{"CFG_DSRC":[{"DSRC_CODE":"X"},{"DSRC_CODE":"Y"},{"DSRC_CODE":"Z"}]}}"#,
        );
        let blacklist = f.roots.old.join("blacklist.json");
        write(&blacklist, r#"{"G2_CONFIG":{"CFG_DSRC":[{"DSRC_CODE":"Y"}]}}"#);

        let plan = ProposalPlan {
            config_merge: Some(ConfigMergeSpec::default()),
            ..ProposalPlan::empty()
        };
        let report = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .with_config_blacklist(Some(blacklist))
            .build()
            .unwrap();

        let output = f.roots.proposed.join("g2/python/g2config.json");
        assert_eq!(report.generated, vec![output.clone()]);
        assert_eq!(
            load_json(&output).unwrap(),
            json!({"G2_CONFIG": {"CFG_DSRC": [{"DSRC_CODE": "X"}, {"DSRC_CODE": "Z"}]}})
        );
    }

    #[test]
    fn config_merge_missing_input_is_fatal() {
        let f = fixture();
        write(&f.roots.new.join("g2/data/g2config.json"), "{}");
        let plan = ProposalPlan {
            config_merge: Some(ConfigMergeSpec::default()),
            ..ProposalPlan::empty()
        };

        let err = ProposalBuilder::new(plan, dsrc_engine(), f.roots.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, ProposalError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn merge_documents_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("existing.json");
        let template = dir.path().join("template.json");
        write(&existing, r#"{"G2_CONFIG":{"CFG_DSRC":[{"DSRC_CODE":"X"}]}}"#);
        write(
            &template,
            r#"{"G2_CONFIG":{"CFG_DSRC":[{"DSRC_CODE":"X"},{"DSRC_CODE":"Y"}]}}"#,
        );
        let engine = dsrc_engine();

        let merged = merge_config_documents(&engine, &existing, &template, None).unwrap();
        assert_eq!(
            merged,
            json!({"G2_CONFIG": {"CFG_DSRC": [{"DSRC_CODE": "X"}, {"DSRC_CODE": "Y"}]}})
        );

        // A blacklist path that does not exist is ignored.
        let absent = dir.path().join("absent.json");
        let merged_again =
            merge_config_documents(&engine, &existing, &template, Some(&absent)).unwrap();
        assert_eq!(merged_again, merged);
    }
}
