//! Reconnect backoff policy.
//!
//! `delay(attempt) = min(base * growth^attempt * jitter, cap)`, with the
//! jitter drawn uniformly from a fixed band so that many clients dropped at
//! once do not retry in lockstep.

use std::time::Duration;

use rand::Rng;

use super::config::WsConfig;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    growth: f64,
    cap: Duration,
    jitter: (f64, f64),
    max_attempts: Option<u32>,
}

impl BackoffPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(base: Duration, growth: f64, cap: Duration, jitter: (f64, f64)) -> Self {
        Self {
            base,
            growth,
            cap,
            jitter,
            max_attempts: None,
        }
    }

    /// Creates a policy from client configuration.
    #[must_use]
    pub fn from_config(config: &WsConfig) -> Self {
        Self {
            base: config.reconnect_delay,
            growth: config.backoff_growth,
            cap: config.max_reconnect_delay,
            jitter: config.jitter,
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Limits the number of retries.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Returns the jitter band.
    #[must_use]
    pub const fn jitter_band(&self) -> (f64, f64) {
        self.jitter
    }

    /// Returns the configured cap.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Returns `base * growth^attempt`, capped, without jitter.
    #[must_use]
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, 1.0)
    }

    /// Returns the delay for an attempt using an explicit jitter factor.
    #[must_use]
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.base.as_nanos() as f64 * self.growth.powi(exponent) * jitter;
        let cap_nanos = self.cap.as_nanos() as f64;

        if !nanos.is_finite() || nanos >= cap_nanos {
            return self.cap;
        }

        Duration::from_nanos(nanos.max(0.0).round() as u64)
    }

    /// Returns the jittered delay for an attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let (min, max) = self.jitter;
        let jitter = if min < max {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        self.delay_with_jitter(attempt, jitter)
    }

    /// Returns true if another retry is allowed after `attempt` failures.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&WsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(2),
            1.5,
            Duration::from_secs(30),
            (0.85, 1.15),
        )
    }

    #[test]
    fn test_nominal_delays_grow_geometrically() {
        let policy = policy();
        assert_eq!(policy.nominal_delay(0), Duration::from_secs(2));
        assert_eq!(policy.nominal_delay(1), Duration::from_secs(3));
        assert_eq!(policy.nominal_delay(2), Duration::from_millis(4_500));
    }

    #[test]
    fn test_delay_capped() {
        let policy = policy();
        assert_eq!(policy.nominal_delay(20), Duration::from_secs(30));
        assert_eq!(policy.nominal_delay(u32::MAX), Duration::from_secs(30));
        assert_eq!(policy.delay_with_jitter(20, 0.85), Duration::from_secs(30));
    }

    #[test]
    fn test_jittered_delay_within_band() {
        let policy = policy();
        for attempt in 0..6 {
            let nominal = policy.nominal_delay(attempt).as_secs_f64();
            for _ in 0..200 {
                let delay = policy.delay(attempt).as_secs_f64();
                assert!(delay >= nominal * 0.85 - 1e-9, "attempt {attempt}: {delay} too small");
                assert!(delay <= nominal * 1.15 + 1e-9, "attempt {attempt}: {delay} too large");
            }
        }
    }

    #[test]
    fn test_jittered_delays_non_decreasing() {
        let policy = policy();
        for _ in 0..100 {
            let mut previous = Duration::ZERO;
            for attempt in 0..15 {
                let delay = policy.delay(attempt);
                assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
                assert!(delay <= policy.cap());
                previous = delay;
            }
        }
    }

    #[test]
    fn test_degenerate_band_has_no_jitter() {
        let policy = BackoffPolicy::new(
            Duration::from_millis(100),
            2.0,
            Duration::from_secs(10),
            (1.0, 1.0),
        );
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_should_retry() {
        let unlimited = policy();
        assert!(unlimited.should_retry(1_000));

        let limited = policy().with_max_attempts(3);
        assert!(limited.should_retry(2));
        assert!(!limited.should_retry(3));
    }

    #[test]
    fn test_from_config() {
        let config = WsConfig::default().with_max_reconnect_attempts(2);
        let policy = BackoffPolicy::from_config(&config);
        assert_eq!(policy.jitter_band(), (0.85, 1.15));
        assert!(!policy.should_retry(2));
    }
}
