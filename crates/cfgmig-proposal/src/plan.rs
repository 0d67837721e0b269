//! What a proposal run does, expressed as path templates.
//!
//! Templates name locations relative to the three roots of a run using the
//! `{old}`, `{new}` and `{proposed}` placeholders. The default plan describes
//! the standard installation layout; a TOML file can replace any part of it.

use std::fmt;
use std::path::{Path, PathBuf};

use cfgmig_merge::UniqueKeyRegistry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProposalError, ProposalResult};

/// The three directory roots of a proposal run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roots {
    pub old: PathBuf,
    pub new: PathBuf,
    pub proposed: PathBuf,
}

impl Roots {
    pub fn new(old: impl Into<PathBuf>, new: impl Into<PathBuf>, proposed: impl Into<PathBuf>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            proposed: proposed.into(),
        }
    }
}

/// A path with `{old}`, `{new}` and `{proposed}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate(String);

impl PathTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Substitute the roots into the template.
    pub fn render(&self, roots: &Roots) -> PathBuf {
        let rendered = self
            .0
            .replace("{old}", &roots.old.to_string_lossy())
            .replace("{new}", &roots.new.to_string_lossy())
            .replace("{proposed}", &roots.proposed.to_string_lossy());
        PathBuf::from(rendered)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathTemplate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An old/new/proposed location handled as one unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTriple {
    pub old: PathTemplate,
    pub new: PathTemplate,
    pub proposed: PathTemplate,
}

impl PathTriple {
    pub fn new(old: &str, new: &str, proposed: &str) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            proposed: proposed.into(),
        }
    }

    /// The same relative location under each of the three roots.
    pub fn mirrored(relative: &str) -> Self {
        Self::new(
            &format!("{{old}}/{relative}"),
            &format!("{{new}}/{relative}"),
            &format!("{{proposed}}/{relative}"),
        )
    }

    pub fn render(&self, roots: &Roots) -> RenderedTriple {
        RenderedTriple {
            old: self.old.render(roots),
            new: self.new.render(roots),
            proposed: self.proposed.render(roots),
        }
    }
}

/// A [`PathTriple`] with the roots substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedTriple {
    pub old: PathBuf,
    pub new: PathBuf,
    pub proposed: PathBuf,
}

/// A file whose lines are logged under `label` before proposing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFile {
    pub label: String,
    pub path: PathTemplate,
}

/// Inputs and output of the configuration document merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMergeSpec {
    pub existing: PathTemplate,
    pub template: PathTemplate,
    pub output: PathTemplate,
}

impl Default for ConfigMergeSpec {
    fn default() -> Self {
        Self {
            existing: "{old}/g2/python/g2config.json".into(),
            template: "{new}/g2/data/g2config.json".into(),
            output: "{proposed}/g2/python/g2config.json".into(),
        }
    }
}

/// Legacy modules under `g2/python` that are never carried forward.
const LEGACY_PYTHON_MODULES: [&str; 21] = [
    "CompressedFile.py",
    "DumpStack.py",
    "G2AnonModule.py",
    "G2AuditModule.py",
    "G2Command.py",
    "G2ConfigModule.py",
    "G2ConfigTables.py",
    "G2Database.py",
    "G2Exception.py",
    "G2Export.py",
    "G2Loader.py",
    "G2Module.py",
    "G2Product.py",
    "G2ProductModule.py",
    "G2Project.py",
    "g2purge.umf",
    "G2Report.py",
    "G2Service.py",
    "g2silent.cfg",
    "G2VCompare.py",
    "UpgradeConfig.py",
];

/// Every step of a proposal run.
///
/// Steps run in field order: version logging, difference logging, whole
/// directory copies, file copies, directory diffs, file diffs, then the
/// configuration merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalPlan {
    pub version_files: Vec<VersionFile>,
    pub log_differences: Vec<PathTriple>,
    pub copy_directories: Vec<PathTriple>,
    pub copy_files: Vec<PathTriple>,
    pub diff_directories: Vec<PathTriple>,
    pub diff_files: Vec<PathTriple>,
    /// Old-side files that are never copied, whatever the step.
    pub blacklist: Vec<PathTemplate>,
    pub config_merge: Option<ConfigMergeSpec>,
}

impl Default for ProposalPlan {
    fn default() -> Self {
        Self {
            version_files: vec![
                VersionFile {
                    label: "old-version".into(),
                    path: "{old}/g2/data/g2BuildVersion.txt".into(),
                },
                VersionFile {
                    label: "new-version".into(),
                    path: "{new}/g2/data/g2BuildVersion.txt".into(),
                },
            ],
            log_differences: vec![PathTriple::new("{old}", "{new}", "{proposed}")],
            copy_directories: Vec::new(),
            copy_files: Vec::new(),
            diff_directories: vec![PathTriple::mirrored("g2/python")],
            diff_files: vec![
                PathTriple::mirrored("g2/setupEnv"),
                PathTriple::mirrored("g2/data/g2.lic"),
                PathTriple::new(
                    "{old}/g2/sqldb/G2C.db",
                    "{old}/g2/data/G2C.db",
                    "{proposed}/g2/sqldb/G2C.db",
                ),
            ],
            blacklist: LEGACY_PYTHON_MODULES
                .iter()
                .map(|name| PathTemplate::new(format!("{{old}}/g2/python/{name}")))
                .collect(),
            config_merge: Some(ConfigMergeSpec::default()),
        }
    }
}

impl ProposalPlan {
    /// A plan with no steps at all.
    pub fn empty() -> Self {
        Self {
            version_files: Vec::new(),
            log_differences: Vec::new(),
            copy_directories: Vec::new(),
            copy_files: Vec::new(),
            diff_directories: Vec::new(),
            diff_files: Vec::new(),
            blacklist: Vec::new(),
            config_merge: None,
        }
    }
}

/// Contents of the `--config` TOML file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Key-set rules that replace the built-in rules of the same collection.
    pub registry: UniqueKeyRegistry,
    pub proposal: ProposalPlan,
}

impl MigrateConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> ProposalResult<Self> {
        let bytes = cfgmig_store::read_bytes(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> ProposalResult<Self> {
        toml::from_str(text).map_err(ProposalError::from)
    }

    /// The built-in registry with this file's entries applied on top.
    pub fn effective_registry(&self) -> UniqueKeyRegistry {
        UniqueKeyRegistry::builtin().with_overrides(self.registry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Roots {
        Roots::new("/opt/old", "/opt/new", "/tmp/proposal")
    }

    #[test]
    fn render_substitutes_every_placeholder() {
        let t = PathTemplate::new("{old}/a:{new}/b:{proposed}/c");
        assert_eq!(
            t.render(&roots()),
            PathBuf::from("/opt/old/a:/opt/new/b:/tmp/proposal/c")
        );
    }

    #[test]
    fn default_plan_layout() {
        let plan = ProposalPlan::default();
        let r = roots();

        assert_eq!(plan.version_files.len(), 2);
        assert_eq!(
            plan.version_files[0].path.render(&r),
            PathBuf::from("/opt/old/g2/data/g2BuildVersion.txt")
        );
        assert_eq!(plan.diff_directories.len(), 1);
        assert_eq!(
            plan.diff_directories[0].render(&r).proposed,
            PathBuf::from("/tmp/proposal/g2/python")
        );

        let db = plan.diff_files[2].render(&r);
        assert_eq!(db.old, PathBuf::from("/opt/old/g2/sqldb/G2C.db"));
        assert_eq!(db.new, PathBuf::from("/opt/old/g2/data/G2C.db"));
        assert_eq!(db.proposed, PathBuf::from("/tmp/proposal/g2/sqldb/G2C.db"));

        assert_eq!(plan.blacklist.len(), 21);
        assert!(plan
            .blacklist
            .iter()
            .any(|t| t.render(&r) == Path::new("/opt/old/g2/python/G2Loader.py")));
        assert!(plan.copy_directories.is_empty());
        assert_eq!(plan.config_merge, Some(ConfigMergeSpec::default()));
    }

    #[test]
    fn empty_toml_is_default() {
        let config = MigrateConfig::from_toml_str("").unwrap();
        assert_eq!(config, MigrateConfig::default());
        assert_eq!(config.effective_registry(), UniqueKeyRegistry::builtin());
    }

    #[test]
    fn toml_overrides_parts_of_the_plan() {
        let text = r#"
            [registry]
            CFG_DSRC = [["DSRC_CODE"]]
            CFG_CUSTOM = [["A", "B"]]

            [proposal]
            blacklist = []
            diff_files = [{ old = "{old}/etc/app.ini", new = "{new}/etc/app.ini", proposed = "{proposed}/etc/app.ini" }]
        "#;
        let config = MigrateConfig::from_toml_str(text).unwrap();

        assert!(config.proposal.blacklist.is_empty());
        assert_eq!(config.proposal.diff_files, vec![PathTriple::mirrored("etc/app.ini")]);
        // Unmentioned fields keep their defaults.
        assert_eq!(config.proposal.diff_directories, ProposalPlan::default().diff_directories);

        let registry = config.effective_registry();
        assert_eq!(
            registry.key_sets("CFG_DSRC"),
            Some(&[vec!["DSRC_CODE".to_string()]][..])
        );
        assert!(registry.contains("CFG_CUSTOM"));
        assert!(registry.contains("CFG_ETYPE"));
    }

    #[test]
    fn empty_key_set_is_rejected() {
        let err = MigrateConfig::from_toml_str("[registry]\nCFG_X = [[]]\n").unwrap_err();
        assert!(matches!(err, ProposalError::Config(_)));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MigrateConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(
            err,
            ProposalError::Store(cfgmig_store::StoreError::NotFound(_))
        ));
    }
}
