//! Retry backoff policies for the reliable subscriber.
//!
//! The historical behavior is immediate re-attempts with no delay; that stays
//! the default, with fixed and exponential policies available as tunables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay policy applied between handler attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryBackoff {
    /// Immediate re-attempt
    None,
    /// Constant delay between attempts
    Fixed { delay_ms: u64 },
    /// Doubling delay, capped
    Exponential { base_ms: u64, cap_ms: u64 },
}

impl Default for RetryBackoff {
    fn default() -> Self {
        RetryBackoff::None
    }
}

impl RetryBackoff {
    /// Delay to apply before attempt `attempt` (1-based; attempt 1 never waits)
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        match self {
            RetryBackoff::None => None,
            RetryBackoff::Fixed { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            RetryBackoff::Exponential { base_ms, cap_ms } => {
                let exp = attempt.saturating_sub(2).min(32);
                let delay = base_ms.saturating_mul(1u64 << exp).min(*cap_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_backoff_never_waits() {
        for attempt in 1..=5 {
            assert_eq!(RetryBackoff::None.delay_before(attempt), None);
        }
    }

    #[test]
    fn test_fixed_backoff() {
        let policy = RetryBackoff::Fixed { delay_ms: 100 };
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let policy = RetryBackoff::Exponential {
            base_ms: 50,
            cap_ms: 400,
        };
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_before(5), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_before(10), Some(Duration::from_millis(400)));
    }
}
