//! Append-only manifest of committed chunk keys.
//!
//! The manifest is an optimisation for reporting where a run resumes from. The chunk
//! store stays authoritative: a lost or damaged manifest is rebuilt by probing the
//! store, and the orchestrator never skips a chunk on the manifest's word alone.

use crate::storage::error::StorageError;
use crate::storage::writer::DurableWriter;
use crate::types::chunk::{Chunk, ChunkKey};
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug)]
pub struct RunProgress {
    path: PathBuf,
    committed: HashSet<ChunkKey>,
    // set when the file ends in a torn line, so the next append starts a fresh one
    needs_newline: bool,
}

impl RunProgress {
    /// Reads an existing manifest. Returns `Ok(None)` when there is none yet.
    /// Lines that do not parse (e.g. a torn final append) are skipped.
    pub async fn load(path: &Path) -> Result<Option<Self>, StorageError> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Read(path.to_path_buf(), e)),
        };

        let mut committed = HashSet::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.parse::<ChunkKey>() {
                Ok(key) => {
                    committed.insert(key);
                }
                Err(e) => warn!("Ignoring manifest line in {:?}: {}", path, e),
            }
        }
        Ok(Some(Self {
            path: path.to_path_buf(),
            committed,
            needs_newline: !text.is_empty() && !text.ends_with('\n'),
        }))
    }

    /// Recreates the manifest from whichever of `planned` chunks the store already holds.
    pub async fn rebuild(
        path: &Path,
        writer: &DurableWriter,
        planned: &[Chunk],
    ) -> Result<Self, StorageError> {
        let mut committed = HashSet::new();
        let mut lines = String::new();
        for chunk in planned {
            let key = chunk.key();
            if writer.exists(&key).await && committed.insert(key.clone()) {
                lines.push_str(&key.to_string());
                lines.push('\n');
            }
        }

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            crate::storage::atomic::write_atomic(&target, lines.as_bytes())
        })
        .await??;

        info!(
            "Rebuilt progress manifest {:?} from chunk store ({} committed chunks)",
            path,
            committed.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            committed,
            needs_newline: false,
        })
    }

    pub async fn load_or_rebuild(
        path: &Path,
        writer: &DurableWriter,
        planned: &[Chunk],
    ) -> Result<Self, StorageError> {
        match Self::load(path).await {
            Ok(Some(progress)) => Ok(progress),
            Ok(None) => Self::rebuild(path, writer, planned).await,
            Err(e) => {
                warn!("Progress manifest unreadable ({}), rebuilding from chunk store", e);
                Self::rebuild(path, writer, planned).await
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &ChunkKey) -> bool {
        self.committed.contains(key)
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Appends `key` and flushes it to disk. Already-recorded keys are not rewritten.
    pub async fn record(&mut self, key: &ChunkKey) -> Result<(), StorageError> {
        if self.committed.contains(key) {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::Write(self.path.clone(), e))?;
        let line = if self.needs_newline {
            format!("\n{key}\n")
        } else {
            format!("{key}\n")
        };
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::Write(self.path.clone(), e))?;
        file.sync_data()
            .await
            .map_err(|e| StorageError::Sync(self.path.clone(), e))?;

        self.needs_newline = false;
        self.committed.insert(key.clone());
        Ok(())
    }
}
