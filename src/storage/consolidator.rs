//! Merges the committed chunk records of one work unit into its yearly archive.

use crate::planner::ChunkPlanner;
use crate::storage::atomic::write_atomic;
use crate::storage::error::StorageError;
use crate::storage::paths::{archive_path, ARCHIVE_DIR};
use crate::storage::writer::DurableWriter;
use crate::types::daily_record::DailyRecord;
use crate::types::period::DatePeriod;
use crate::types::work_unit::WorkUnit;
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::{fs, task};

/// A consolidated, date-sorted archive for one (station, year).
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyArchive {
    pub unit: WorkUnit,
    pub path: PathBuf,
    /// Distinct dates in the archive.
    pub records: usize,
    /// `records` divided by the number of days in the year.
    pub coverage: f64,
}

impl YearlyArchive {
    pub fn is_below(&self, min_coverage: f64) -> bool {
        self.coverage < min_coverage
    }

    /// Reads the records of an archive file back.
    pub async fn read_records(path: &Path) -> Result<Vec<DailyRecord>, StorageError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| StorageError::Read(path.to_path_buf(), e))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Decode(path.to_path_buf(), e))
    }
}

#[derive(Debug, Clone)]
pub struct Consolidator {
    writer: DurableWriter,
    planner: ChunkPlanner,
    root: PathBuf,
}

impl Consolidator {
    /// Writes archives under `<data_root>/archive`, reading chunks through `writer`.
    /// `planner` must be the one the chunks were fetched with.
    pub fn new(data_root: &Path, writer: DurableWriter, planner: ChunkPlanner) -> Self {
        Self {
            writer,
            planner,
            root: data_root.join(ARCHIVE_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self, unit: &WorkUnit) -> PathBuf {
        archive_path(&self.root, unit)
    }

    /// Builds the yearly archive for `unit` from its committed chunks.
    ///
    /// Chunks are applied in ascending start order, so when two chunks carry the same
    /// date the one starting later wins. Within a chunk the last record for a date
    /// wins. Records dated outside the unit's year are dropped. The output depends only
    /// on the chunk contents: rebuilding from the same chunks yields identical bytes.
    ///
    /// Fails with [`StorageError::NotFound`] if any planned chunk is not committed.
    pub async fn consolidate(&self, unit: &WorkUnit) -> Result<YearlyArchive, StorageError> {
        let mut chunks = self.planner.plan(&unit.station_id, unit.year);
        chunks.sort_by_key(|chunk| chunk.start);
        let span = unit.year.get_date_period();

        let mut by_date: BTreeMap<NaiveDate, DailyRecord> = BTreeMap::new();
        for chunk in &chunks {
            let key = chunk.key();
            let payload = self.writer.read(&key).await?;
            for raw in payload.records() {
                let record = DailyRecord::from_raw(raw)
                    .map_err(|e| StorageError::Decode(self.writer.chunk_path(&key), e))?;
                if !span.is_some_and(|s| s.contains(record.date)) {
                    warn!(
                        "Dropping record dated {} from chunk {}: outside {}",
                        record.date, key, unit.year
                    );
                    continue;
                }
                by_date.insert(record.date, record);
            }
        }

        let records: Vec<DailyRecord> = by_date.into_values().collect();
        let path = self.archive_path(unit);
        let bytes =
            serde_json::to_vec_pretty(&records).map_err(|e| StorageError::Encode(path.clone(), e))?;
        let path = task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;

        let days = unit.year.days().unwrap_or(365).max(1);
        let archive = YearlyArchive {
            unit: unit.clone(),
            path,
            records: records.len(),
            coverage: records.len() as f64 / f64::from(days),
        };
        info!(
            "Consolidated {} into {:?} ({} records, {:.1}% coverage)",
            unit,
            archive.path,
            archive.records,
            archive.coverage * 100.0
        );
        Ok(archive)
    }
}
