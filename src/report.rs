//! End-of-run outcome per work unit.

use crate::fetch::error::FetchError;
use crate::storage::consolidator::YearlyArchive;
use crate::types::work_unit::WorkUnit;
use std::fmt;
use thiserror::Error;

/// Why a work unit did not complete in this run. Re-running the harvest retries it,
/// refetching only the chunks that were not committed.
#[derive(Debug, Error)]
pub enum UnitFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Interrupted before all chunks were committed")]
    Interrupted,
}

#[derive(Debug)]
pub enum UnitOutcome {
    Complete(YearlyArchive),
    Failed(UnitFailure),
}

#[derive(Debug)]
pub struct UnitReport {
    pub unit: WorkUnit,
    pub outcome: UnitOutcome,
    /// Chunks downloaded and committed in this run.
    pub chunks_fetched: usize,
    /// Chunks skipped because an earlier run had already committed them.
    pub chunks_resumed: usize,
    /// Retries spent on this unit's chunks in this run.
    pub retries: u32,
}

impl UnitReport {
    pub fn archive(&self) -> Option<&YearlyArchive> {
        match &self.outcome {
            UnitOutcome::Complete(archive) => Some(archive),
            UnitOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&UnitFailure> {
        match &self.outcome {
            UnitOutcome::Failed(failure) => Some(failure),
            UnitOutcome::Complete(_) => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Complete(_))
    }
}

/// Result of [`Harvester::run`](crate::Harvester::run), one entry per work unit in
/// station × year order.
#[derive(Debug)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    pub min_coverage: f64,
}

impl RunReport {
    pub fn completed(&self) -> Vec<&YearlyArchive> {
        self.units.iter().filter_map(UnitReport::archive).collect()
    }

    pub fn failed(&self) -> Vec<(&WorkUnit, &UnitFailure)> {
        self.units
            .iter()
            .filter_map(|r| r.failure().map(|f| (&r.unit, f)))
            .collect()
    }

    /// Completed archives whose coverage is below the configured threshold.
    pub fn low_coverage(&self) -> Vec<&YearlyArchive> {
        self.completed()
            .into_iter()
            .filter(|a| a.is_below(self.min_coverage))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.units.iter().all(UnitReport::is_complete)
    }

    pub fn chunks_fetched(&self) -> usize {
        self.units.iter().map(|r| r.chunks_fetched).sum()
    }

    pub fn chunks_resumed(&self) -> usize {
        self.units.iter().map(|r| r.chunks_resumed).sum()
    }

    pub fn retries(&self) -> u32 {
        self.units.iter().map(|r| r.retries).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} work units complete, {} failed, {} low coverage; {} chunks fetched, {} resumed, {} retries",
            self.completed().len(),
            self.units.len(),
            self.failed().len(),
            self.low_coverage().len(),
            self.chunks_fetched(),
            self.chunks_resumed(),
            self.retries()
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for report in &self.units {
            match &report.outcome {
                UnitOutcome::Complete(archive) => writeln!(
                    f,
                    "  {}: Complete ({} records, {:.1}% coverage{})",
                    report.unit,
                    archive.records,
                    archive.coverage * 100.0,
                    if archive.is_below(self.min_coverage) {
                        ", below threshold"
                    } else {
                        ""
                    }
                )?,
                UnitOutcome::Failed(failure) => {
                    write!(f, "  {}: Failed ({}", report.unit, failure)?;
                    let mut cause = std::error::Error::source(failure);
                    while let Some(e) = cause {
                        write!(f, ": {e}")?;
                        cause = e.source();
                    }
                    writeln!(f, ")")?
                }
            }
        }
        Ok(())
    }
}
