use crate::storage::atomic::write_atomic;
use crate::storage::error::StorageError;
use crate::storage::paths::{chunk_path, CHUNKS_DIR};
use crate::types::chunk::ChunkKey;
use crate::types::payload::RawPayload;
use log::info;
use std::path::{Path, PathBuf};
use tokio::{fs, task};

/// Durable store of committed chunk records, addressed by [`ChunkKey`].
///
/// A record is visible under its final path only after its bytes have been flushed to
/// stable storage and atomically renamed into place, so [`exists`](Self::exists) is
/// true exactly for chunks whose commit finished. Commits for different keys touch
/// different paths and may run concurrently.
#[derive(Debug, Clone)]
pub struct DurableWriter {
    root: PathBuf,
}

impl DurableWriter {
    /// Stores chunk records under `<data_root>/chunks`.
    pub fn new(data_root: &Path) -> Self {
        Self {
            root: data_root.join(CHUNKS_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_path(&self, key: &ChunkKey) -> PathBuf {
        chunk_path(&self.root, key)
    }

    pub async fn exists(&self, key: &ChunkKey) -> bool {
        fs::metadata(self.chunk_path(key))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Persists `payload` for `key`, replacing any earlier commit for the same key.
    pub async fn commit(&self, key: &ChunkKey, payload: &RawPayload) -> Result<PathBuf, StorageError> {
        let path = self.chunk_path(key);
        let bytes = serde_json::to_vec_pretty(payload)
            .map_err(|e| StorageError::Encode(path.clone(), e))?;

        let path = task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;
        info!("Committed chunk {} ({} records)", key, payload.len());
        Ok(path)
    }

    pub async fn read(&self, key: &ChunkKey) -> Result<RawPayload, StorageError> {
        let path = self.chunk_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.clone()))
            }
            Err(e) => return Err(StorageError::Read(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Decode(path, e))
    }
}
