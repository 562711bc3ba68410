//! Reconnect Backoff
//!
//! Delays between reconnect attempts grow by a multiplier up to a cap, with
//! optional random spread. A fixed delay is `multiplier = 1.0` with no
//! jitter.

use std::time::Duration;

use rand::Rng;

/// Backoff parameters for the reconnect loop.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first attempt after a session ends.
    pub initial_delay: Duration,
    /// Upper bound for the grown delay.
    pub max_delay: Duration,
    /// Growth factor applied after every attempt.
    pub multiplier: f64,
    /// Random spread as a fraction of the delay (0.1 = +/-10%).
    pub jitter_factor: f64,
    /// Attempts allowed between successful sessions (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(10),
            Duration::from_secs(300),
            2.0,
            0.1,
            0,
        )
    }
}

impl ReconnectConfig {
    /// Build a configuration from explicit values.
    #[must_use]
    pub const fn new(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            jitter_factor,
            max_attempts,
        }
    }

    /// Constant delay with no growth and no jitter.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0, 0.0, 0)
    }

    /// Backoff parameters from environment settings.
    #[must_use]
    pub const fn from_settings(settings: &crate::ReconnectSettings) -> Self {
        Self::new(
            settings.delay_initial,
            settings.delay_max,
            settings.delay_multiplier,
            settings.jitter_factor,
            settings.max_attempts,
        )
    }
}

/// Backoff state for one supervisor.
///
/// # Example
///
/// ```rust
/// use binance_stream_connector::infrastructure::binance::reconnect::{
///     ReconnectConfig, ReconnectPolicy,
/// };
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::fixed(Duration::from_secs(10)));
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(10)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(10)));
///
/// // Session reached streaming
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Start at the configured initial delay.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt, or `None` once the attempt
    /// budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;

        let delay = self.current_delay;
        self.current_delay = scale(delay, self.config.multiplier).min(self.config.max_delay);
        Some(jitter(delay, self.config.jitter_factor))
    }

    /// Return to the initial delay after a session reached streaming.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }
}

/// Multiply a delay at millisecond resolution. Non-positive or NaN factors
/// collapse to zero; overflow saturates.
fn scale(delay: Duration, multiplier: f64) -> Duration {
    #[allow(clippy::cast_precision_loss)]
    let millis = (delay.as_millis() as f64 * multiplier).round();
    if millis.is_nan() || millis <= 0.0 {
        return Duration::ZERO;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Duration::from_millis(millis as u64)
}

/// Spread a delay uniformly by `factor` (capped at 1.0) in both directions,
/// never below 1ms.
fn jitter(delay: Duration, factor: f64) -> Duration {
    if !factor.is_finite() || factor <= 0.0 || delay.is_zero() {
        return delay;
    }

    let base = delay.as_secs_f64();
    let spread = base * factor.min(1.0);
    let offset = rand::rng().random_range(-spread..=spread);
    Duration::try_from_secs_f64((base + offset).max(0.001)).unwrap_or(delay)
}

/// Reconnect loop failures.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// Attempt budget spent without reaching a streaming session.
    #[error("gave up after {0} reconnect attempts")]
    MaxAttemptsExceeded(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn no_jitter(initial_ms: u64, max_ms: u64, multiplier: f64, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig::new(
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            multiplier,
            0.0,
            max_attempts,
        ))
    }

    fn delays_ms(policy: &mut ReconnectPolicy, n: usize) -> Vec<u128> {
        (0..n)
            .filter_map(|_| policy.next_delay())
            .map(|d| d.as_millis())
            .collect()
    }

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(10));
        assert_eq!(config.max_delay, Duration::from_secs(300));
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
        assert!((config.jitter_factor - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn fixed_delay_never_grows() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::fixed(Duration::from_secs(10)));
        assert!(delays_ms(&mut policy, 20).iter().all(|&d| d == 10_000));
        assert!(policy.should_retry());
    }

    #[test_case(100, 10_000, 2.0, &[100, 200, 400, 800] ; "doubling")]
    #[test_case(1000, 2000, 4.0, &[1000, 2000, 2000] ; "capped")]
    #[test_case(10_000, 300_000, 2.0, &[10_000, 20_000, 40_000, 80_000, 160_000, 300_000, 300_000] ; "defaults without jitter")]
    fn backoff_sequence(initial: u64, max: u64, multiplier: f64, expected: &[u128]) {
        let mut policy = no_jitter(initial, max, multiplier, 0);
        assert_eq!(delays_ms(&mut policy, expected.len()), expected);
    }

    #[test]
    fn max_attempts_exhausted() {
        let mut policy = no_jitter(100, 1000, 2.0, 3);

        assert_eq!(delays_ms(&mut policy, 3).len(), 3);
        assert_eq!(policy.attempt_count(), 3);
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
    }

    #[test]
    fn reset_restores_initial_delay() {
        let mut policy = no_jitter(100, 10_000, 2.0, 3);
        let _ = delays_ms(&mut policy, 2);
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test_case(1e308 ; "huge finite factor")]
    #[test_case(5.0 ; "factor above one")]
    #[test_case(f64::INFINITY ; "infinite factor")]
    #[test_case(f64::NAN ; "nan factor")]
    fn oversized_jitter_stays_bounded(factor: f64) {
        let config = ReconnectConfig::new(
            Duration::from_secs(10),
            Duration::from_secs(300),
            2.0,
            factor,
            0,
        );
        for _ in 0..50 {
            let mut policy = ReconnectPolicy::new(config.clone());
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((1..=20_000).contains(&millis), "delay {millis}ms out of bounds");
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((9_000..=11_000).contains(&millis), "delay {millis}ms out of bounds");
        }
    }
}
