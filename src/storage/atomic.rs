//! Write-to-temp, fsync, rename.
//!
//! A file written through here is either absent or complete under its final name.
//! Temporary files live next to their target (same filesystem, so the rename is
//! atomic) and start with `.tmp`, which is how interrupted leftovers are recognised.

use crate::storage::error::StorageError;
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

pub(crate) const TEMP_PREFIX: &str = ".tmp";

/// Bytes that are durably on disk under a temporary name, not yet published.
pub(crate) struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

pub(crate) fn stage(target: &Path, bytes: &[u8]) -> Result<StagedWrite, StorageError> {
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).map_err(|e| StorageError::DirCreation(dir.clone(), e))?;

    let mut temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(&dir)
        .map_err(|e| StorageError::TempFile(dir.clone(), e))?;
    temp.write_all(bytes)
        .map_err(|e| StorageError::Write(temp.path().to_path_buf(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StorageError::Sync(temp.path().to_path_buf(), e))?;

    Ok(StagedWrite {
        temp,
        target: target.to_path_buf(),
    })
}

impl StagedWrite {
    /// Atomically replaces the target with the staged bytes.
    pub(crate) fn publish(self) -> Result<PathBuf, StorageError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| StorageError::Rename(target.clone(), e.error))?;
        if let Some(dir) = target.parent() {
            sync_dir(dir)?;
        }
        Ok(target)
    }

    #[cfg(test)]
    pub(crate) fn abandon_on_disk(self) -> PathBuf {
        // Simulates a crash between fsync and rename: the temp file stays behind.
        match self.temp.into_temp_path().keep() {
            Ok(path) => path,
            Err(e) => panic!("failed to keep temp file: {e}"),
        }
    }
}

pub(crate) fn write_atomic(target: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError> {
    stage(target, bytes)?.publish()
}

/// Makes the rename itself durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StorageError::Sync(dir.to_path_buf(), e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StorageError> {
    Ok(())
}

/// Recursively deletes temporary files left behind by interrupted writes under `root`.
/// Returns how many were removed.
pub(crate) fn sweep_temp_files(root: &Path) -> Result<usize, StorageError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::Read(root.to_path_buf(), e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::Read(root.to_path_buf(), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| StorageError::Read(path.clone(), e))?;

        if file_type.is_dir() {
            removed += sweep_temp_files(&path)?;
        } else if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Removed interrupted write {:?}", path);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Temporary file {:?} vanished during sweep", path);
                }
                Err(e) => return Err(StorageError::Remove(path, e)),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("file.json");

        write_atomic(&target, b"first").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"first");

        write_atomic(&target, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");

        let names: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["file.json"]);
    }

    #[test]
    fn test_abandoned_stage_never_appears_under_target_name() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x").join("file.json");

        let leftover = stage(&target, b"torn").unwrap().abandon_on_disk();
        assert!(leftover.exists());
        assert!(!target.exists());

        assert_eq!(sweep_temp_files(dir.path()).unwrap(), 1);
        assert!(!leftover.exists());
        assert_eq!(sweep_temp_files(dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_sweep_missing_root_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(sweep_temp_files(&dir.path().join("absent")).unwrap(), 0);
    }
}
