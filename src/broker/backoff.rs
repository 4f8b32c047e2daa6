//! Jittered exponential backoff for reconnect attempts.

use rand::Rng;
use std::time::Duration;

use crate::config::ReconnectConfig;

/// Exponential backoff with uniform jitter and a bounded maximum interval.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_secs(config.max_delay_secs),
        )
    }

    /// Delay before the given attempt (1-based), before jitter.
    ///
    /// Doubles per attempt, saturating at the configured maximum.
    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let unclamped = self
            .initial
            .checked_mul(1u32 << exp.min(31))
            .unwrap_or(self.max);
        unclamped.min(self.max)
    }

    /// Jittered delay before the given attempt (1-based).
    ///
    /// Uniformly sampled from [base/2, base], so concurrent deployments do
    /// not reconnect in lockstep after a broker restart.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if base.is_zero() {
            return base;
        }
        let half = base / 2;
        let jitter = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
        half + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(30))
    }

    #[test]
    fn base_doubles_until_cap() {
        let p = policy();
        assert_eq!(p.base_delay(1), Duration::from_millis(500));
        assert_eq!(p.base_delay(2), Duration::from_secs(1));
        assert_eq!(p.base_delay(3), Duration::from_secs(2));
        assert_eq!(p.base_delay(7), Duration::from_secs(30));
        assert_eq!(p.base_delay(100), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = policy();
        for attempt in 1..=10 {
            let base = p.base_delay(attempt);
            for _ in 0..50 {
                let d = p.delay(attempt);
                assert!(d >= base / 2, "delay {d:?} below half of base {base:?}");
                assert!(d <= base, "delay {d:?} above base {base:?}");
            }
        }
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let p = policy();
        assert_eq!(p.base_delay(u32::MAX), Duration::from_secs(30));
    }
}
