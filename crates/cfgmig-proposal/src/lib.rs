//! Proposal assembly for cfgmig.
//!
//! Given an old installation and a new one, builds a third "proposed" tree
//! holding only what must be layered onto the new installation to carry the
//! old customizations forward: changed and old-only files, plus a merged
//! configuration document.
//!
//! # Key Types
//!
//! - [`ProposalPlan`] / [`PathTriple`] -- the steps of a run, as path templates
//! - [`ProposalBuilder`] -- executes a plan against three roots
//! - [`ProposalReport`] -- what was copied, suppressed and skipped
//! - [`MigrateConfig`] -- the TOML configuration file

pub mod builder;
pub mod error;
pub mod plan;
pub mod report;

pub use builder::{merge_config_documents, ProposalBuilder};
pub use error::{ProposalError, ProposalResult};
pub use plan::{
    ConfigMergeSpec, MigrateConfig, PathTemplate, PathTriple, ProposalPlan, RenderedTriple, Roots,
    VersionFile,
};
pub use report::{PartialSkip, ProposalReport, Step};
