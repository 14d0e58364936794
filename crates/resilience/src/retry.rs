//! Retry Logic with Exponential Backoff
//!
//! Repeats idempotent calls that failed for a transient reason.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial backoff duration
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential)
    pub backoff_multiplier: f32,

    /// Maximum backoff duration
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Apply ±10% jitter to each backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(16),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, never retried
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate backoff duration for given attempt number (0-indexed)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f32;
        let multiplier = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let mut backoff_ms = base_ms * multiplier;

        if self.jitter {
            backoff_ms *= 0.9 + fastrand::f32() * 0.2;
        }

        if !backoff_ms.is_finite() {
            return self.max_backoff;
        }
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }
}

/// Retry an async operation with exponential backoff
///
/// `should_retry` decides whether a given error is worth another attempt;
/// the first non-retryable error is returned as is, and so is the last error
/// once `max_attempts` is reached.
///
/// # Example
///
/// ```rust,ignore
/// let policy = RetryPolicy::default();
/// let lb = retry_with_backoff(&policy, "get_load_balancer", CloudError::is_retryable, || async {
///     client.fetch(&id).await
/// }).await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    operation: &str,
    should_retry: R,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !should_retry(&e) {
                    return Err(e);
                }

                let backoff = policy.backoff_duration(attempt - 1);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retry attempt failed"
                );
                sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(1),
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(32),
            ..RetryPolicy::default()
        };

        // 100ms * 2^0 ± 10%
        let backoff_0 = policy.backoff_duration(0);
        assert!(
            backoff_0 >= Duration::from_millis(90) && backoff_0 <= Duration::from_millis(110),
            "Expected 90-110ms, got {backoff_0:?}"
        );

        // 100ms * 2^2 ± 10%
        let backoff_2 = policy.backoff_duration(2);
        assert!(
            backoff_2 >= Duration::from_millis(360) && backoff_2 <= Duration::from_millis(440),
            "Expected 360-440ms, got {backoff_2:?}"
        );

        assert_eq!(policy.backoff_duration(20), Duration::from_secs(32));
    }

    #[test]
    fn without_jitter_backoff_is_exact() {
        let policy = fast_policy();
        assert_eq!(policy.backoff_duration(0), Duration::from_millis(10));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_on_second_attempt() {
        let counter = AtomicU32::new(0);

        let result = retry_with_backoff(&fast_policy(), "test_op", |_: &String| true, || async {
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if count == 1 {
                Err("first attempt fails".to_string())
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_after_max_attempts() {
        let counter = AtomicU32::new(0);

        let err = retry_with_backoff(&fast_policy(), "test_op", |_: &String| true, || async {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(format!("failure {n}"))
        })
        .await
        .unwrap_err();

        assert_eq!(err, "failure 3");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_is_returned_immediately() {
        let counter = AtomicU32::new(0);

        let err = retry_with_backoff(
            &fast_policy(),
            "test_op",
            |e: &String| e != "permanent",
            || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("permanent".to_string())
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err, "permanent");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn none_policy_allows_a_single_attempt() {
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
