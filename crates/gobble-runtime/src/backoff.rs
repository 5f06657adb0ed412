//! Reconnect delays.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff with uniform jitter.
///
/// The delay before reconnect attempt `n` is `min(max_delay, 2^n s)` plus a
/// jitter drawn from `[0, max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_delay: Duration,
    max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(1))
    }
}

impl Backoff {
    pub fn new(max_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_delay,
            max_jitter,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_secs(config.max_delay_secs),
            Duration::from_millis(config.jitter_ms),
        )
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// The deterministic part of the delay for `retry`.
    pub fn base_delay(&self, retry: u32) -> Duration {
        2u64.checked_pow(retry)
            .map(Duration::from_secs)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// A fresh jitter sample.
    pub fn jitter(&self) -> Duration {
        let bound = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..bound))
    }

    /// Full delay to wait before reconnect attempt `retry`.
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay(retry) + self.jitter()
    }
}
