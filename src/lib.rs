mod config;
mod error;
mod fetch;
mod harvester;
mod planner;
mod report;
mod storage;
mod types;
mod utils;

#[cfg(test)]
mod testing;

pub use config::HarvestConfig;
pub use error::HarvestError;
pub use harvester::Harvester;
pub use planner::{ChunkPlanner, DEFAULT_CHUNK_SPAN_MONTHS};
pub use report::{RunReport, UnitFailure, UnitOutcome, UnitReport};

pub use fetch::aemet::{AemetSource, AEMET_BASE_URL, API_KEY_ENV};
pub use fetch::error::FetchError;
pub use fetch::rate_limiter::RateLimiter;
pub use fetch::retry::{FetchedChunk, RetryPolicy, RetryingClient};
pub use fetch::source::{RecordSource, SourceError};

pub use storage::consolidator::{Consolidator, YearlyArchive};
pub use storage::error::StorageError;
pub use storage::frame::load_archive_frame;
pub use storage::paths::{ARCHIVE_DIR, CHUNKS_DIR, MANIFEST_FILE};
pub use storage::progress::RunProgress;
pub use storage::writer::DurableWriter;

pub use types::chunk::{Chunk, ChunkKey, ParseChunkKeyError};
pub use types::daily_record::DailyRecord;
pub use types::payload::{PayloadError, RawPayload, DATE_FIELD};
pub use types::period::{DatePeriod, StartEndDate, Year};
pub use types::work_unit::WorkUnit;

pub use utils::get_data_dir;
