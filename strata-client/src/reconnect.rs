//! Reconnection backoff policy
//!
//! When an authenticated connection drops, the policy decides whether the
//! next attempt happens and how long to wait first. It is a pure value:
//! the connection manager passes the current attempt counter in, so one
//! policy instance serves every reconnection cycle without carrying state.
//!
//! The delay grows linearly with the attempt number and is capped at one
//! minute: `delay(n) = min(base_interval * n, 60s)`.

use std::time::Duration;

/// Upper bound on a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Linear backoff policy with an attempt limit.
///
/// Attempt numbers are 1-based. Unsigned fields make negative configuration
/// unrepresentable, so construction cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    base_interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_interval: Duration) -> Self {
        Self {
            max_attempts,
            base_interval,
        }
    }

    /// Delay before the given 1-based attempt, capped at 60 seconds.
    pub fn delay(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1, "attempt numbers are 1-based");
        self.base_interval.saturating_mul(attempt).min(MAX_DELAY)
    }

    /// Whether another attempt is allowed after the given number of failed
    /// attempts.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    /// 5 attempts, 5 second base interval.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_delay_sequence_caps_at_one_minute() {
        let policy = ReconnectPolicy::new(20, Duration::from_millis(5000));

        let delays: Vec<u64> = (1..=14)
            .map(|attempt| policy.delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![
                5000, 10000, 15000, 20000, 25000, 30000, 35000, 40000, 45000, 50000, 55000,
                60000, 60000, 60000
            ]
        );
    }

    #[test]
    fn retry_eligibility() {
        let policy = ReconnectPolicy::new(5, Duration::from_secs(1));

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn zero_attempts_never_retries() {
        let policy = ReconnectPolicy::new(0, Duration::from_secs(1));
        assert!(!policy.should_retry(0));
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn zero_interval_is_valid() {
        let policy = ReconnectPolicy::new(3, Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(policy.delay(1000), Duration::ZERO);
    }
}
