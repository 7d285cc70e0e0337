//! Request-sized sub-ranges of a [`WorkUnit`](crate::WorkUnit) and the stable key that
//! identifies them across runs.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KEY_DATE_FORMAT: &str = "%Y%m%d";

/// Deterministic identity of a [`Chunk`]: station plus inclusive date bounds.
///
/// The textual form is `{station_id}_{YYYYMMDD}_{YYYYMMDD}`. It is used as the
/// idempotency key for retries, as the lookup key of committed chunk records and as
/// the line format of the run manifest.
///
/// ```
/// use station_harvest::ChunkKey;
/// use chrono::NaiveDate;
///
/// let key = ChunkKey::new(
///     "0061X",
///     NaiveDate::from_ymd_opt(2009, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2009, 6, 30).unwrap(),
/// );
/// assert_eq!(key.to_string(), "0061X_20090101_20090630");
/// assert_eq!(key.to_string().parse::<ChunkKey>().unwrap(), key);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    station_id: String,
    start: NaiveDate,
    end: NaiveDate,
}

impl ChunkKey {
    pub fn new(station_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            station_id: station_id.into(),
            start,
            end,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.station_id,
            self.start.format(KEY_DATE_FORMAT),
            self.end.format(KEY_DATE_FORMAT)
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid chunk key")]
pub struct ParseChunkKeyError(pub String);

impl FromStr for ChunkKey {
    type Err = ParseChunkKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseChunkKeyError(s.to_string());
        // Station ids may themselves contain underscores, so split from the right.
        let mut parts = s.rsplitn(3, '_');
        let end = parts.next().ok_or_else(invalid)?;
        let start = parts.next().ok_or_else(invalid)?;
        let station_id = parts.next().filter(|id| !id.is_empty()).ok_or_else(invalid)?;

        let parse = |raw: &str| {
            if raw.len() != 8 {
                return Err(invalid());
            }
            NaiveDate::parse_from_str(raw, KEY_DATE_FORMAT).map_err(|_| invalid())
        };
        let start = parse(start)?;
        let end = parse(end)?;
        if end < start {
            return Err(invalid());
        }
        Ok(ChunkKey::new(station_id, start, end))
    }
}

/// One request-sized window of a station's records.
///
/// Chunks are produced by [`ChunkPlanner`](crate::ChunkPlanner); both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub station_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Chunk {
    pub fn new(station_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            station_id: station_id.into(),
            start,
            end,
        }
    }

    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.station_id.clone(), self.start, self.end)
    }

    /// Number of calendar days covered, bounds included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl From<&ChunkKey> for Chunk {
    fn from(key: &ChunkKey) -> Self {
        Chunk::new(key.station_id.clone(), key.start, key.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_key_roundtrips_station_with_underscore() {
        let key = ChunkKey::new("ST_01", date(2012, 7, 1), date(2012, 12, 31));
        assert_eq!(key.to_string(), "ST_01_20120701_20121231");
        assert_eq!("ST_01_20120701_20121231".parse::<ChunkKey>(), Ok(key));
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert!("".parse::<ChunkKey>().is_err());
        assert!("0061X_20090101".parse::<ChunkKey>().is_err());
        assert!("_20090101_20090630".parse::<ChunkKey>().is_err());
        // torn manifest line
        assert!("0061X_20090101_200906".parse::<ChunkKey>().is_err());
        // reversed bounds
        assert!("0061X_20090630_20090101".parse::<ChunkKey>().is_err());
    }

    #[test]
    fn test_chunk_days_inclusive() {
        let chunk = Chunk::new("0061X", date(2009, 1, 1), date(2009, 6, 30));
        assert_eq!(chunk.days(), 181);
        assert_eq!(Chunk::from(&chunk.key()), chunk);
    }
}
