//! JSON tree merge engine for cfgmig.
//!
//! Reconciles an existing configuration document with the template shipped
//! by a newer installation. The policy is "prefer the existing value, add the
//! missing template value"; list elements are matched through a
//! [`UniqueKeyRegistry`] of compound keys so a template row that differs from
//! an existing row only in non-key fields is not added twice.
//!
//! # Key Types
//!
//! - [`MergeEngine`] / [`MergePolicy`] -- the merge, fold and difference policies
//! - [`UniqueKeyRegistry`] -- collection name → key-sets
//! - [`normalize`] -- canonical list ordering for pretty-printing
//! - [`MergeError`] / [`Shape`] -- incompatible shapes at the same key

pub mod engine;
pub mod error;
pub mod normalize;
pub mod registry;

pub use engine::{difference, is_falsy, MergeEngine, MergePolicy, DSRC_ETYPE_COLLECTIONS, G2_CONFIG_SECTION};
pub use error::{MergeError, MergeResult, RegistryError, RegistryResult, Shape};
pub use normalize::{canonical_cmp, normalize};
pub use registry::{KeySet, UniqueKeyRegistry};
