//! Retry policy and reset-time arithmetic for rate-limited classifier calls.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Bounded retry for throttled classification calls.
///
/// Only the rate-limit status retries; everything else fails on the first
/// attempt. There is no backoff curve, the wait comes from the server's
/// reset time or the fixed fallback.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fallback_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            fallback_wait: Duration::from_secs(60),
        }
    }
}

/// How long to wait before retrying a throttled call.
///
/// `reset_header` is the raw `X-RateLimit-Reset` value, epoch seconds. An
/// absent or unreadable header yields the fallback. A reset time already in
/// the past yields a zero wait, the retry proceeds immediately.
pub fn reset_wait(reset_header: Option<&str>, now: SystemTime, fallback: Duration) -> Duration {
    let Some(raw) = reset_header else {
        return fallback;
    };
    let Ok(reset_secs) = raw.trim().parse::<u64>() else {
        return fallback;
    };

    let reset = UNIX_EPOCH + Duration::from_secs(reset_secs);
    reset.duration_since(now).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(epoch_secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(epoch_secs)
    }

    #[test]
    fn waits_until_reset_time() {
        let wait = reset_wait(Some("1002"), at(1000), Duration::from_secs(60));
        assert_eq!(wait, Duration::from_secs(2));
    }

    #[test]
    fn reset_in_the_past_is_a_zero_wait() {
        let wait = reset_wait(Some("900"), at(1000), Duration::from_secs(60));
        assert_eq!(wait, Duration::ZERO);

        let wait = reset_wait(Some("1000"), at(1000), Duration::from_secs(60));
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn missing_header_uses_fallback() {
        let wait = reset_wait(None, at(1000), Duration::from_secs(60));
        assert_eq!(wait, Duration::from_secs(60));
    }

    #[test]
    fn unreadable_header_uses_fallback() {
        let wait = reset_wait(Some("soon"), at(1000), Duration::from_secs(60));
        assert_eq!(wait, Duration::from_secs(60));

        let wait = reset_wait(Some("-5"), at(1000), Duration::from_secs(60));
        assert_eq!(wait, Duration::from_secs(60));
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.fallback_wait, Duration::from_secs(60));
    }
}
