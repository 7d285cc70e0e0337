//! The upstream capability the engine consumes: "give me the daily records for this
//! station between these two dates".

use crate::fetch::rate_limiter::RateLimiter;
use crate::types::chunk::Chunk;
use crate::types::payload::RawPayload;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;

/// A remote source of daily station records.
///
/// Implementations perform exactly one logical attempt per call; retrying and backoff
/// are layered on top by [`RetryingClient`](crate::RetryingClient). The operation must
/// be a pure read so that it can be repeated any number of times for the same chunk.
///
/// `gate` is the run's shared [`RateLimiter`]. Implementations must `acquire` it before
/// every upstream request they send, so a source that needs several requests per
/// chunk still stays under the request ceiling.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(&self, chunk: &Chunk, gate: &RateLimiter)
        -> Result<RawPayload, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request for {url} returned status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("No data available for station {station_id} between {start} and {end}")]
    NoData {
        station_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("AEMET API key not provided (set AEMET_API_KEY)")]
    MissingApiKey,

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl SourceError {
    /// Timeouts, connection problems, HTTP 429 and HTTP 5xx are worth retrying.
    /// Everything else is permanent for the chunk that produced it.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            SourceError::Timeout(_) => true,
            SourceError::NetworkRequest(_, e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
            }
            SourceError::Malformed { .. }
            | SourceError::NoData { .. }
            | SourceError::MissingApiKey
            | SourceError::ClientBuild(_) => false,
        }
    }

    /// Maps a transport-level reqwest failure onto this taxonomy.
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout(url.to_string())
        } else if e.is_decode() {
            SourceError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            SourceError::HttpStatus {
                url: url.to_string(),
                status,
            }
        } else {
            SourceError::NetworkRequest(url.to_string(), e)
        }
    }
}
