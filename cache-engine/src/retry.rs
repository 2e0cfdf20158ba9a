use std::time::Duration;

use rand::Rng;

/// Retry schedule for transient transport failures: exponential backoff with
/// uniform jitter, bounded by a maximum delay.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Base delay before the given zero-indexed retry, without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    /// Base delay plus jitter drawn uniformly from `[0, base/10)`.
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let spread = base.as_secs_f64() / 10.0;
        if spread <= 0.0 {
            return base;
        }
        base + Duration::from_secs_f64(rand::rng().random_range(0.0..spread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(2), Duration::from_millis(400));
        assert_eq!(policy.base_delay(4), Duration::from_millis(1_600));
        assert_eq!(policy.base_delay(5), Duration::from_secs(2));
        assert_eq!(policy.base_delay(30), Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_stays_within_a_tenth_of_base() {
        let policy = RetryPolicy::default();
        for retry in 0..4 {
            let base = policy.base_delay(retry);
            for _ in 0..50 {
                let delay = policy.jittered_delay(retry);
                assert!(delay >= base, "{delay:?} below base {base:?}");
                assert!(
                    delay.as_secs_f64() <= base.as_secs_f64() * 1.1 + f64::EPSILON,
                    "{delay:?} above jitter ceiling for base {base:?}"
                );
            }
        }
    }

    #[test]
    fn test_zero_base_skips_jitter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(policy.jittered_delay(0), Duration::ZERO);
    }
}
