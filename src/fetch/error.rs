use crate::fetch::source::SourceError;
use crate::types::chunk::ChunkKey;
use crate::types::payload::PayloadError;
use thiserror::Error;

/// Terminal outcome for one chunk. Any of these marks the owning work unit as failed
/// for the current run without affecting other work units.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Chunk {key} failed after {attempts} attempts")]
    Exhausted {
        key: ChunkKey,
        attempts: u32,
        #[source]
        last: SourceError,
    },

    #[error("Chunk {key} was rejected by the upstream source")]
    Rejected {
        key: ChunkKey,
        #[source]
        source: SourceError,
    },

    #[error("Chunk {key} returned an invalid payload")]
    InvalidPayload {
        key: ChunkKey,
        #[source]
        source: PayloadError,
    },
}

impl FetchError {
    pub fn key(&self) -> &ChunkKey {
        match self {
            FetchError::Exhausted { key, .. }
            | FetchError::Rejected { key, .. }
            | FetchError::InvalidPayload { key, .. } => key,
        }
    }
}
