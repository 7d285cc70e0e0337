//! Run-wide knobs of a harvest.

use crate::error::HarvestError;
use crate::fetch::retry::RetryPolicy;
use crate::planner::{ChunkPlanner, DEFAULT_CHUNK_SPAN_MONTHS};
use crate::types::payload::DATE_FIELD;
use std::time::Duration;

/// Configuration of a [`Harvester`](crate::Harvester).
///
/// Every field has a default matching the documented AEMET deployment, so only the
/// values that differ need to be set:
///
/// ```
/// use station_harvest::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .workers(4)
///     .min_coverage(0.9)
///     .build();
/// assert_eq!(config.max_requests_per_second, 5.0);
/// assert_eq!(config.chunk_span_months, 6);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct HarvestConfig {
    /// Upper bound on upstream calls per second, shared by all workers.
    #[builder(default = 5.0)]
    pub max_requests_per_second: f64,

    /// Calendar months covered by one upstream request (1..=12).
    #[builder(default = DEFAULT_CHUNK_SPAN_MONTHS)]
    pub chunk_span_months: u32,

    /// Attempts per chunk, the first one included.
    #[builder(default = 5)]
    pub max_attempts: u32,

    #[builder(default = Duration::from_secs(2))]
    pub base_delay: Duration,

    #[builder(default = Duration::from_secs(70))]
    pub max_delay: Duration,

    #[builder(default = true)]
    pub jitter: bool,

    /// Work units processed concurrently.
    #[builder(default = 1)]
    pub workers: usize,

    /// Fields every upstream record must carry for a payload to be accepted.
    #[builder(default = vec![DATE_FIELD.to_string()])]
    pub required_fields: Vec<String>,

    /// Archives with a smaller share of days present are flagged as low coverage.
    #[builder(default = 0.85)]
    pub min_coverage: f64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<(), HarvestError> {
        let invalid = |msg: String| Err(HarvestError::InvalidConfig(msg));

        if !(self.max_requests_per_second.is_finite() && self.max_requests_per_second > 0.0) {
            return invalid(format!(
                "max_requests_per_second must be positive, got {}",
                self.max_requests_per_second
            ));
        }
        if !(1..=12).contains(&self.chunk_span_months) {
            return invalid(format!(
                "chunk_span_months must be between 1 and 12, got {}",
                self.chunk_span_months
            ));
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1".to_string());
        }
        if self.max_delay < self.base_delay {
            return invalid(format!(
                "max_delay ({:?}) is shorter than base_delay ({:?})",
                self.max_delay, self.base_delay
            ));
        }
        if self.workers == 0 {
            return invalid("workers must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_coverage) {
            return invalid(format!(
                "min_coverage must be within [0, 1], got {}",
                self.min_coverage
            ));
        }
        Ok(())
    }

    pub fn planner(&self) -> ChunkPlanner {
        ChunkPlanner::new(self.chunk_span_months)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
        }
    }
}
