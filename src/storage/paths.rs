//! On-disk layout of a data root:
//!
//! ```text
//! <root>/progress.manifest
//! <root>/chunks/Station_<id>/<year>/part_<YYYYMMDD>_<YYYYMMDD>.json
//! <root>/archive/Station_<id>/data_<year>.json
//! ```

use crate::types::chunk::ChunkKey;
use crate::types::work_unit::WorkUnit;
use chrono::Datelike;
use std::path::{Path, PathBuf};

pub const CHUNKS_DIR: &str = "chunks";
pub const ARCHIVE_DIR: &str = "archive";
pub const MANIFEST_FILE: &str = "progress.manifest";

/// Keeps ASCII letters, digits, `-` and `_`; every other byte is percent-encoded, so
/// distinct station ids always get distinct directories.
pub(crate) fn station_dir_name(station_id: &str) -> String {
    let mut name = String::with_capacity("Station_".len() + station_id.len());
    name.push_str("Station_");
    for byte in station_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name
}

pub(crate) fn chunk_path(chunks_root: &Path, key: &ChunkKey) -> PathBuf {
    chunks_root
        .join(station_dir_name(key.station_id()))
        .join(format!("{:04}", key.start().year()))
        .join(format!(
            "part_{}_{}.json",
            key.start().format("%Y%m%d"),
            key.end().format("%Y%m%d")
        ))
}

pub(crate) fn archive_path(archive_root: &Path, unit: &WorkUnit) -> PathBuf {
    archive_root
        .join(station_dir_name(&unit.station_id))
        .join(format!("data_{}.json", unit.year))
}
