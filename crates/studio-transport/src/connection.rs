//! Reconnect policy.

use std::time::Duration;

use rand::Rng;
use studio_ipc::ReconnectConfig;

/// Reconnection policy configuration.
///
/// Attempts are numbered from 1 within a reconnect cycle. The first attempt
/// after a drop is immediate; later ones back off exponentially.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of consecutive reconnection attempts.
    pub max_attempts: u32,

    /// Delay before the second attempt (exponential backoff applied).
    pub base_delay: Duration,

    /// Maximum delay between attempts, before jitter.
    pub max_delay: Duration,

    /// Fraction of the delay added as random jitter.
    pub jitter: f64,

    /// A connection open at least this long starts a fresh cycle.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter.clamp(0.0, 1.0),
            stable_after: Duration::from_millis(config.stable_after_ms),
        }
    }
}

impl ReconnectPolicy {
    /// Delay for a given attempt number, without jitter.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Delay for a given attempt number, with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for_attempt(attempt);
        if delay.is_zero() || self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay + delay.mul_f64(factor)
    }

    /// Check if another attempt is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Whether a connection that stayed open this long resets the cycle.
    pub fn is_stable(&self, open_for: Duration) -> bool {
        open_for >= self.stable_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
            jitter: 0.0,
            stable_after: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_reconnect_policy_delays() {
        let policy = policy();

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(3000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_reconnect_policy_jitter_bounds() {
        let policy = ReconnectPolicy {
            jitter: 0.25,
            ..policy()
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(3);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_reconnect_policy_should_retry() {
        let policy = policy();

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_millis(500));
        assert!(policy.is_stable(Duration::from_secs(10)));
        assert!(!policy.is_stable(Duration::from_secs(9)));
    }
}
