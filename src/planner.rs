//! Splits a `(station, year)` work unit into request-sized chunks.

use crate::types::chunk::Chunk;
use crate::types::period::{DatePeriod, Year};
use chrono::{Days, Months};

/// Default number of calendar months covered by one upstream request.
pub const DEFAULT_CHUNK_SPAN_MONTHS: u32 = 6;

/// Deterministic planner of chunk boundaries.
///
/// Windows start on January 1st and advance by a fixed number of calendar months; the
/// last window is clamped to December 31st. The same inputs always yield the same
/// boundaries, which is what keeps [`ChunkKey`](crate::ChunkKey)s stable across runs.
///
/// ```
/// use station_harvest::{ChunkPlanner, Year};
///
/// let chunks = ChunkPlanner::new(6).plan("0061X", Year(2009));
/// let keys: Vec<String> = chunks.iter().map(|c| c.key().to_string()).collect();
/// assert_eq!(keys, ["0061X_20090101_20090630", "0061X_20090701_20091231"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    span_months: u32,
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SPAN_MONTHS)
    }
}

impl ChunkPlanner {
    /// Spans outside `1..=12` months are clamped into that range.
    pub fn new(span_months: u32) -> Self {
        Self {
            span_months: span_months.clamp(1, 12),
        }
    }

    pub fn span_months(&self) -> u32 {
        self.span_months
    }

    pub fn plan(&self, station_id: &str, year: Year) -> Vec<Chunk> {
        let Some(period) = year.get_date_period() else {
            return Vec::new();
        };

        let mut chunks = Vec::new();
        let mut start = period.start;
        loop {
            let next_start = start.checked_add_months(Months::new(self.span_months));
            let end = next_start
                .and_then(|next| next.checked_sub_days(Days::new(1)))
                .map_or(period.end, |last| last.min(period.end));
            chunks.push(Chunk::new(station_id, start, end));

            match next_start {
                Some(next) if next <= period.end => start = next,
                _ => break,
            }
        }
        chunks
    }
}
