use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use kolscout_common::config::RateLimitConfig;

/// Enforces minimum inter-request spacing for one platform client instance.
///
/// Each `wait` sleeps until a jittered delay drawn from `[min, max)` has
/// elapsed since the previous `wait` returned. Repeated throttle signals add
/// `min(consecutive * penalty_unit, penalty_cap)` on top; the first
/// successful response clears the penalty. Pacing only; retry counts live
/// in `RetryPolicy`.
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    penalty_unit: Duration,
    penalty_cap: Duration,
    consecutive_throttles: AtomicU32,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            penalty_unit: Duration::from_secs(config.penalty_unit_secs),
            penalty_cap: Duration::from_secs(config.penalty_cap_secs),
            consecutive_throttles: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// The delay the next `wait` will enforce: jittered base plus the
    /// current throttle penalty. Exposed so tests can assert backoff
    /// without sleeping.
    pub fn current_delay(&self) -> Duration {
        let base = if self.max_delay > self.min_delay {
            let spread = (self.max_delay - self.min_delay).as_millis() as u64;
            self.min_delay + Duration::from_millis(rand::rng().random_range(0..spread))
        } else {
            self.min_delay
        };

        let throttles = self.consecutive_throttles.load(Ordering::Relaxed);
        if throttles == 0 {
            return base;
        }
        let penalty = (self.penalty_unit * throttles).min(self.penalty_cap);
        base + penalty
    }

    /// Block until the required spacing since the previous call has elapsed.
    pub async fn wait(&self) {
        let delay = self.current_delay();
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Record a throttling signal (HTTP 429 or equivalent) from the platform.
    pub fn throttled(&self) {
        let count = self.consecutive_throttles.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(consecutive = count, "throttle signal, growing request spacing");
    }

    /// Record a successful (non-throttled) response; clears the penalty.
    pub fn succeeded(&self) {
        let previous = self.consecutive_throttles.swap(0, Ordering::Relaxed);
        if previous > 0 {
            info!(previous_throttles = previous, "rate limit lifted");
        }
    }

    pub fn consecutive_throttles(&self) -> u32 {
        self.consecutive_throttles.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(min_ms: u64, max_ms: u64, unit: u64, cap: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            min_delay_ms: min_ms,
            max_delay_ms: max_ms,
            penalty_unit_secs: unit,
            penalty_cap_secs: cap,
        })
    }

    #[test]
    fn no_jitter_when_bounds_equal() {
        let limiter = limiter(1_000, 1_000, 2, 5);
        assert_eq!(limiter.current_delay(), Duration::from_secs(1));
    }

    #[test]
    fn penalty_caps_after_repeated_throttles() {
        // [1.0, 1.0) with unit=2s, cap=5s: after three throttles the
        // next wait is 1.0 + min(3*2, 5) = 6.0 seconds.
        let limiter = limiter(1_000, 1_000, 2, 5);
        limiter.throttled();
        limiter.throttled();
        limiter.throttled();
        assert_eq!(limiter.current_delay(), Duration::from_secs(6));
    }

    #[test]
    fn backoff_grows_monotonically_then_caps() {
        let limiter = limiter(1_000, 1_000, 2, 5);
        let mut previous = limiter.current_delay();
        let mut grew = 0;
        for _ in 0..4 {
            limiter.throttled();
            let next = limiter.current_delay();
            assert!(next >= previous, "delay never shrinks under throttling");
            if next > previous {
                grew += 1;
            }
            previous = next;
        }
        assert!(grew >= 2, "delay should strictly grow before the cap");
        assert_eq!(previous, Duration::from_secs(6), "capped at base + 5s");
    }

    #[test]
    fn success_resets_penalty() {
        let limiter = limiter(1_000, 1_000, 2, 5);
        limiter.throttled();
        limiter.throttled();
        assert_eq!(limiter.consecutive_throttles(), 2);
        limiter.succeeded();
        assert_eq!(limiter.consecutive_throttles(), 0);
        assert_eq!(limiter.current_delay(), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_inside_bounds() {
        let limiter = limiter(1_000, 2_000, 2, 5);
        for _ in 0..50 {
            let delay = limiter.current_delay();
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay < Duration::from_millis(2_000));
        }
    }

    #[tokio::test]
    async fn wait_enforces_spacing() {
        let limiter = limiter(30, 30, 0, 0);
        let start = Instant::now();
        limiter.wait().await; // first call has no predecessor
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
