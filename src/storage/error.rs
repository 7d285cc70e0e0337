use crate::types::chunk::ChunkKey;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the local archive. Any of these means durability can no longer be
/// guaranteed, so they abort the run instead of failing a single work unit.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No committed chunk record for {0}")]
    NotFound(ChunkKey),

    #[error("Failed to create directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to create temporary file in '{0}'")]
    TempFile(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to flush '{0}' to stable storage")]
    Sync(PathBuf, #[source] std::io::Error),

    #[error("Failed to move temporary file into place at '{0}'")]
    Rename(PathBuf, #[source] std::io::Error),

    #[error("Failed to read '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to remove '{0}'")]
    Remove(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode '{0}'")]
    Decode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode records for '{0}'")]
    Encode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to load archive frame from '{0}'")]
    Frame(PathBuf, #[source] PolarsError),

    #[error("Background storage task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
