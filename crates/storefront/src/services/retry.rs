//! Bounded retry for transactions that lose a serialization race.
//!
//! `PostgreSQL` aborts one of two conflicting `SERIALIZABLE` transactions with
//! SQLSTATE `40001` (or `40P01` on deadlock). The repositories surface those as
//! [`DomainError::Conflict`]; [`retry_on_conflict`] re-runs the whole unit of
//! work a limited number of times with a short jittered pause in between.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use waladaw_core::DomainError;

/// How many times to run an operation and how long to wait between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause before the second attempt; grows linearly with each retry.
    pub base_delay: Duration,
    /// Upper bound of the random extra pause added to every retry.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Policy used by checkout.
    #[must_use]
    pub const fn checkout(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(20),
            max_jitter: Duration::from_millis(30),
        }
    }

    /// Pause before retry number `retry` (1-based).
    fn delay(&self, retry: u32) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_delay.saturating_mul(retry) + Duration::from_millis(jitter)
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or the
/// attempts run out. The closure receives the 1-based attempt number.
///
/// # Errors
///
/// Returns the first non-conflict error unchanged, or `DomainError::Conflict`
/// once every attempt has conflicted.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, DomainError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match operation(attempt).await {
            Err(DomainError::Conflict) if attempt < attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(attempt, ?delay, "transaction conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(DomainError::Conflict) => {
                tracing::warn!(attempts, "transaction conflict, giving up");
                return Err(DomainError::Conflict);
            }
            result => return result,
        }
    }
    Err(DomainError::Conflict)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::ZERO,
        max_jitter: Duration::ZERO,
    };

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict(FAST, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(DomainError::Conflict)
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict(FAST, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DomainError::Conflict) }
        })
        .await;
        assert_eq!(result, Err(DomainError::Conflict));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict(FAST, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DomainError::rule("Your cart is empty")) }
        })
        .await;
        assert_eq!(result, Err(DomainError::rule("Your cart is empty")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..FAST
        };
        let result = retry_on_conflict(policy, |_| async { Ok::<_, DomainError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_delay_grows_and_stays_bounded() {
        let policy = RetryPolicy::checkout(3);
        for retry in 1..=3 {
            let delay = policy.delay(retry);
            assert!(delay >= Duration::from_millis(20) * retry);
            assert!(delay <= Duration::from_millis(20) * retry + Duration::from_millis(30));
        }
    }
}
