//! Token-bucket rate limiting.
//!
//! [`TokenBucket`] gates connection and subscription attempts at a
//! configured sustained rate with a burst allowance. [`KeyedTokenBucket`]
//! holds one independent bucket per string key (e.g. per symbol), created
//! lazily and sharing a single rate/capacity configuration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::error::KervielError;

/// Refill rates at or below this are treated as "never refills".
const RATE_EPSILON: f64 = 1e-9;

/// Floor applied to computed sleeps so floating-point underflow can never
/// produce a zero-length spin.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Mutable bucket state, guarded by the bucket's mutex.
struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A token bucket holding up to `capacity` tokens, refilled continuously at
/// `rate` tokens per second. One token is consumed per admission.
///
/// The mutex is held only for the in-memory refill/consume step; [`wait`]
/// releases it while sleeping, so one waiter never blocks another from
/// refilling time.
///
/// [`wait`]: TokenBucket::wait
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a bucket that starts full. Negative inputs are clamped to zero.
    #[must_use]
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = rate.max(0.0);
        let capacity = capacity.max(0.0);
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_update: Instant::now(),
            }),
        }
    }

    /// Sustained refill rate in tokens per second.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum number of tokens the bucket can hold.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Credits elapsed time since the last update, capped at capacity.
    ///
    /// `last_update` may sit in the future when a sub-token-capacity waiter
    /// has reserved its top-up interval; the saturating subtraction makes
    /// that read as "no time elapsed yet".
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_update);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        if now > state.last_update {
            state.last_update = now;
        }
    }

    /// Consumes one token if at least one is available after refill.
    /// Non-blocking; returns `false` on an empty bucket.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("limiter mutex poisoned");
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Blocks until one token is available or `cancel` fires.
    ///
    /// On cancellation it returns promptly without consuming a token.
    ///
    /// # Errors
    ///
    /// [`KervielError::RateExhausted`] if the bucket is empty and the refill
    /// rate is zero (waiting would never complete), or
    /// [`KervielError::Cancelled`] if the token fires first.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let delay = {
                let mut state = self.state.lock().expect("limiter mutex poisoned");
                let now = Instant::now();
                self.refill(&mut state, now);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                if self.rate <= RATE_EPSILON {
                    return Err(KervielError::RateExhausted(
                        "bucket empty and refill rate is zero",
                    ));
                }

                let deficit = 1.0 - state.tokens;
                let delay = Duration::from_secs_f64(deficit / self.rate).max(MIN_WAIT);
                if self.capacity < 1.0 {
                    // The bucket can never hold a whole token. Claim the
                    // fractional balance and reserve the top-up interval so
                    // concurrent waiters queue behind this admission.
                    state.tokens = 0.0;
                    state.last_update = now + delay;
                }
                delay
            };

            tokio::select! {
                () = cancel.cancelled() => {
                    if self.capacity < 1.0 {
                        // Give the reservation back.
                        let mut state = self.state.lock().expect("limiter mutex poisoned");
                        if let Some(rolled_back) = state.last_update.checked_sub(delay) {
                            state.last_update = rolled_back;
                        }
                    }
                    return Err(KervielError::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }

            // Sub-token buckets admit directly after the reserved interval;
            // re-checking the capped balance would find zero forever.
            if self.capacity < 1.0 {
                return Ok(());
            }
        }
    }
}

/// A map of independent [`TokenBucket`]s keyed by string, all sharing one
/// rate/capacity configuration. Buckets are created on first lookup.
pub struct KeyedTokenBucket {
    rate: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Arc<TokenBucket>>>,
}

impl KeyedTokenBucket {
    /// Creates an empty keyed limiter.
    #[must_use]
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            rate,
            capacity,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the bucket for `key`, creating it (full) if absent.
    pub fn bucket(&self, key: &str) -> Arc<TokenBucket> {
        let mut buckets = self.buckets.lock().expect("limiter mutex poisoned");
        buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.rate, self.capacity)))
            .clone()
    }

    /// Number of buckets created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.lock().expect("limiter mutex poisoned").len()
    }

    /// Whether no bucket has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
