//! Backoff between attempts at a grading step that hit a sandbox failure.

use rand::Rng;
use std::time::Duration;
use util::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-attempts after the first try.
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            min_delay: min_delay.min(max_delay),
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config() -> Self {
        let cfg = AppConfig::global();
        Self::new(cfg.max_retries, cfg.min_retry_delay(), cfg.max_retry_delay())
    }

    /// Retries immediately. For tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Whether re-attempt number `retry` (1-based) is allowed.
    pub fn allows(&self, retry: u32) -> bool {
        retry <= self.max_retries
    }

    /// Upper bound of the delay before re-attempt `retry`: `min * 2^(retry-1)`
    /// clamped to `[min, max]`.
    pub fn delay_bound(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.min_delay
            .saturating_mul(factor)
            .clamp(self.min_delay, self.max_delay)
    }

    /// A random delay in `[min, delay_bound(retry)]`.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let bound = self.delay_bound(retry);
        if bound <= self.min_delay {
            return self.min_delay;
        }
        let millis = rand::thread_rng().gen_range(whole_millis(self.min_delay)..=whole_millis(bound));
        Duration::from_millis(millis)
    }
}

/// Milliseconds in `delay`, saturating at `u64::MAX`.
pub(crate) fn whole_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1), Duration::from_secs(2))
    }
}
