use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("store error: {0}")]
    Store(#[from] cfgmig_store::StoreError),

    #[error("diff error: {0}")]
    Diff(#[from] cfgmig_diff::DiffError),

    #[error("merge error: {0}")]
    Merge(#[from] cfgmig_merge::MergeError),

    #[error("registry error: {0}")]
    Registry(#[from] cfgmig_merge::RegistryError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
}

pub type ProposalResult<T> = Result<T, ProposalError>;
