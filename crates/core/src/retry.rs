//! Backoff arithmetic for queue redelivery and per-profile scoring retries.

use std::time::Duration;

/// Base delay for queue redelivery backoff.
pub const QUEUE_BACKOFF_BASE_SECS: u64 = 5;

/// Maximum queue delivery attempts before a job is marked fatal.
pub const QUEUE_MAX_ATTEMPTS: i16 = 3;

/// Redelivery delay after `attempt` failed deliveries (1-based):
/// 5s, 10s, 20s, doubling per attempt.
pub fn queue_backoff(attempt: i16) -> Duration {
    let attempt = attempt.max(1) as u32;
    Duration::from_secs(QUEUE_BACKOFF_BASE_SECS << (attempt - 1).min(6))
}

/// Scoring retry delay after `attempt` failed calls (1-based): 1s then 2s.
pub fn scoring_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt.max(1) - 1).min(4))
}

/// Maximum scoring retries per profile (after the initial attempt).
pub const SCORING_MAX_RETRIES: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_backoff_doubles_from_base() {
        assert_eq!(queue_backoff(1), Duration::from_secs(5));
        assert_eq!(queue_backoff(2), Duration::from_secs(10));
        assert_eq!(queue_backoff(3), Duration::from_secs(20));
    }

    #[test]
    fn queue_backoff_is_bounded() {
        assert!(queue_backoff(100) <= Duration::from_secs(5 * 64));
    }

    #[test]
    fn scoring_backoff_is_one_then_two_seconds() {
        assert_eq!(scoring_backoff(1), Duration::from_secs(1));
        assert_eq!(scoring_backoff(2), Duration::from_secs(2));
    }
}
