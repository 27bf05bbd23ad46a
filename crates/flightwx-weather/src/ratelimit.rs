//! Token-bucket rate limiter for outbound provider requests.

use std::sync::Mutex;
use std::time::Instant;

/// Fixed-capacity bucket refilling continuously at a fixed rate.
///
/// `try_acquire` is fail-fast: when no token is available it returns false
/// immediately rather than blocking, so a full evaluation cycle has a
/// bounded worst-case duration. Callers decide whether to retry.
#[derive(Debug)]
pub struct TokenBucket {
    inner: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            inner: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: refill_per_sec.max(0.001),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
