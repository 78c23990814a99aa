//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::time::Duration;

use sfo_common::FailoverSettings;

/// Attempt limits and inter-attempt delays for a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    exponential_backoff: bool,
}

impl RetryPolicy {
    /// `max_attempts` below one is clamped to one.
    pub fn new(max_attempts: u32, base_delay: Duration, exponential_backoff: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            exponential_backoff,
        }
    }

    pub fn constant(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(max_attempts, base_delay, false)
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(max_attempts, base_delay, true)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn exponential_backoff(&self) -> bool {
        self.exponential_backoff
    }

    /// Delay to wait before `attempt` (1-indexed). Attempt 1 never waits; with
    /// backoff attempt n waits `base_delay * 2^(n-2)`. Saturates at `Duration::MAX`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        if !self.exponential_backoff {
            return self.base_delay;
        }
        2u32.checked_pow(attempt - 2)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Sum of every inter-attempt delay spent on one resource.
    pub fn worst_case_delay(&self) -> Duration {
        let mut total = Duration::ZERO;
        for attempt in 2..=self.max_attempts {
            total = total.saturating_add(self.delay_for(attempt));
            if total == Duration::MAX {
                break;
            }
        }
        total
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::constant(3, Duration::from_secs(1))
    }
}

impl From<&FailoverSettings> for RetryPolicy {
    fn from(settings: &FailoverSettings) -> Self {
        Self::new(
            settings.retry_attempts,
            settings.retry_delay,
            settings.exponential_backoff,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfo_common::ResourceKind;

    #[test]
    fn zero_attempts_clamp_to_one() {
        let policy = RetryPolicy::constant(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert_eq!(policy.worst_case_delay(), Duration::ZERO);
    }

    #[test]
    fn backoff_doubles_from_second_attempt() {
        let base = Duration::from_millis(100);
        let backoff = RetryPolicy::exponential(4, base);
        assert_eq!(backoff.delay_for(1), Duration::ZERO);
        assert_eq!(backoff.delay_for(2), base);
        assert_eq!(backoff.delay_for(3), base * 2);
        assert_eq!(backoff.delay_for(4), base * 4);
        assert_eq!(backoff.worst_case_delay(), Duration::from_millis(700));

        let constant = RetryPolicy::constant(4, base);
        assert_eq!(constant.delay_for(4), base);
        assert_eq!(constant.worst_case_delay(), Duration::from_millis(300));
    }

    #[test]
    fn zero_base_delay_never_waits() {
        let policy = RetryPolicy::exponential(10, Duration::ZERO);
        assert!((1..=10).all(|attempt| policy.delay_for(attempt).is_zero()));
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = RetryPolicy::exponential(u32::MAX, Duration::from_secs(1));
        assert_eq!(policy.delay_for(200), Duration::MAX);
        assert_eq!(policy.worst_case_delay(), Duration::MAX);
    }

    #[test]
    fn built_from_kind_defaults() {
        let settings = FailoverSettings::defaults_for(ResourceKind::Queue);
        let policy = RetryPolicy::from(&settings);
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.exponential_backoff());
        assert_eq!(policy.delay_for(3), Duration::from_millis(4_000));
    }
}
