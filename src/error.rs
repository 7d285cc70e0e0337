use crate::fetch::source::SourceError;
use crate::storage::error::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole harvest. Per-chunk fetch failures are not among them:
/// those are isolated to their work unit and show up in the [`RunReport`](crate::RunReport).
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid harvest configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution,
}
