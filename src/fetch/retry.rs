//! Bounded retry with exponential backoff around a [`RecordSource`].
//!
//! Every attempt hands the shared [`RateLimiter`] to the source, which passes it before
//! each upstream request. Transient failures (timeouts, connection errors, HTTP 429 and 5xx) are
//! retried after `base_delay * 2^attempt`, capped at `max_delay` and optionally
//! jittered. Permanent failures surface immediately.
//!
//! With the defaults (5 attempts, 2s base, 70s cap) the waits between attempts are
//! 2s, 4s, 8s and 16s before the chunk is given up as exhausted.

use crate::fetch::error::FetchError;
use crate::fetch::rate_limiter::RateLimiter;
use crate::fetch::source::RecordSource;
use crate::types::chunk::{Chunk, ChunkKey};
use crate::types::payload::RawPayload;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per chunk, the first one included. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Scale each delay by a random factor in `[0.5, 1.0]` so parallel workers do not
    /// retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(70),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = 2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay);
        let capped = exponential.min(self.max_delay);
        if self.jitter {
            capped.mul_f64(0.5 + rand::random::<f64>() * 0.5)
        } else {
            capped
        }
    }
}

/// A successfully fetched chunk and how many retries it took.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedChunk {
    pub payload: RawPayload,
    pub retries: u32,
}

pub struct RetryingClient {
    source: Arc<dyn RecordSource>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    retry_counts: Mutex<HashMap<ChunkKey, u32>>,
}

impl RetryingClient {
    pub fn new(source: Arc<dyn RecordSource>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            source,
            limiter,
            policy,
            retry_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Retries spent on `key` since the counts were last reset. The harvester resets
    /// them at the start of every run, so they cover the latest run only.
    pub fn retry_count(&self, key: &ChunkKey) -> u32 {
        self.retry_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn reset_retry_counts(&self) {
        self.retry_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn note_retry(&self, key: &ChunkKey) {
        *self
            .retry_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.clone())
            .or_insert(0) += 1;
    }

    pub async fn fetch(&self, chunk: &Chunk) -> Result<FetchedChunk, FetchError> {
        let key = chunk.key();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            match self.source.fetch_records(chunk, &self.limiter).await {
                Ok(payload) => {
                    if attempt > 0 {
                        info!("Chunk {} succeeded after {} retries", key, attempt);
                    }
                    return Ok(FetchedChunk {
                        payload,
                        retries: attempt,
                    });
                }
                Err(e) if !e.is_transient() => {
                    warn!("Chunk {} failed permanently: {}", key, e);
                    return Err(FetchError::Rejected { key, source: e });
                }
                Err(e) => {
                    if attempt + 1 >= max_attempts {
                        warn!(
                            "Chunk {} still failing after {} attempts, giving up: {}",
                            key, max_attempts, e
                        );
                        return Err(FetchError::Exhausted {
                            key,
                            attempts: max_attempts,
                            last: e,
                        });
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Chunk {}: {} (retry {}/{} in {:?})",
                        key,
                        e,
                        attempt + 1,
                        max_attempts - 1,
                        delay
                    );
                    self.note_retry(&key);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
