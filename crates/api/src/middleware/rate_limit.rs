//! Per-key token bucket used to throttle login attempts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Buckets idle for this long are dropped on the next sweep.
const IDLE_EVICTION_SECS: u64 = 600;

/// Sweep stale buckets once the map grows past this many keys.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket keyed by client IP.
///
/// Each key holds up to `capacity` tokens and regains `capacity` per minute.
#[derive(Debug)]
pub struct LoginRateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl LoginRateLimiter {
    /// A limiter allowing `per_minute` attempts per key per minute.
    ///
    /// `0` disables limiting.
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = f64::from(per_minute);
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Consume one token for `key`. Returns `false` when the bucket is empty.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        if self.capacity <= 0.0 {
            return true;
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, b| now.duration_since(b.last_refill).as_secs() < IDLE_EVICTION_SECS);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(TokenBucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn burst_up_to_capacity_then_blocks() {
        let limiter = LoginRateLimiter::per_minute(3);
        let now = Instant::now();
        assert!(limiter.try_acquire_at("1.2.3.4", now));
        assert!(limiter.try_acquire_at("1.2.3.4", now));
        assert!(limiter.try_acquire_at("1.2.3.4", now));
        assert!(!limiter.try_acquire_at("1.2.3.4", now));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = LoginRateLimiter::per_minute(1);
        let now = Instant::now();
        assert!(limiter.try_acquire_at("a", now));
        assert!(!limiter.try_acquire_at("a", now));
        assert!(limiter.try_acquire_at("b", now));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = LoginRateLimiter::per_minute(60);
        let start = Instant::now();
        for _ in 0..60 {
            assert!(limiter.try_acquire_at("k", start));
        }
        assert!(!limiter.try_acquire_at("k", start));
        assert!(limiter.try_acquire_at("k", start + Duration::from_secs(1)));
    }

    #[test]
    fn zero_disables_limiting() {
        let limiter = LoginRateLimiter::per_minute(0);
        for _ in 0..100 {
            assert!(limiter.try_acquire("k"));
        }
    }
}
