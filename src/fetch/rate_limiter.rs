use log::debug;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Duration, Instant};

/// Fixed-interval gate shared by every caller that talks to the upstream API.
///
/// Each [`acquire`](RateLimiter::acquire) reserves the next free slot under a lock and
/// then sleeps, outside the lock, until that slot arrives. Slots are spaced by at least
/// `1s / max_per_second`, so no sliding one-second window ever sees more than
/// `max_per_second` acquisitions. Callers are served in lock order; nobody starves.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Non-positive or non-finite rates fall back to one request per second.
    pub fn new(max_per_second: f64) -> Self {
        let rate = if max_per_second.is_finite() && max_per_second > 0.0 {
            max_per_second
        } else {
            1.0
        };
        // Round up so that `rate` slots always span at least one full second.
        let interval = Duration::from_nanos((1_000_000_000_f64 / rate).ceil() as u64);
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };

        if slot > Instant::now() {
            debug!("Rate limiter holding request for {:?}", slot - Instant::now());
            sleep_until(slot).await;
        }
    }
}
