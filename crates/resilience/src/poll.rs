//! Poll-until-resolved loop with an injectable interval policy

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};

use crate::error::{ConfigError, PollError};

/// Interval between checks when no policy is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Resolved; stop polling
    Ready(T),
    /// Not yet resolved; sleep and check again
    Pending,
}

/// How the interval grows between checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same interval every time
    #[default]
    Fixed,
    /// `interval * multiplier^attempt`, capped at `max_interval`
    Exponential {
        /// Growth factor (>= 1.0)
        multiplier: f64,
        /// Upper bound for a single sleep
        #[serde(with = "humantime_serde")]
        max_interval: Duration,
    },
}

/// Polling policy
///
/// The default checks every five seconds, never backs off and never gives up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep after the first pending check
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Interval growth
    #[serde(default)]
    pub backoff: Backoff,

    /// Give up once this much time has passed
    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_POLL_INTERVAL)
    }
}

impl PollPolicy {
    /// Fixed interval, no deadline
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff: Backoff::Fixed,
            deadline: None,
        }
    }

    /// Re-check without sleeping (fakes and tests)
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Give up after `deadline`
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Grow the interval exponentially up to `max_interval`
    pub fn with_exponential_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff = Backoff::Exponential {
            multiplier,
            max_interval,
        };
        self
    }

    /// Sleep before check number `attempt + 1` (0-indexed)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                multiplier,
                max_interval,
            } => {
                let base_ms = self.interval.as_millis() as f64;
                let exp = attempt.min(i32::MAX as u32) as i32;
                let delay_ms = base_ms * multiplier.powi(exp);
                if !delay_ms.is_finite() || delay_ms >= max_interval.as_millis() as f64 {
                    *max_interval
                } else {
                    Duration::from_millis(delay_ms as u64)
                }
            }
        }
    }

    /// Validate the policy parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Backoff::Exponential {
            multiplier,
            max_interval,
        } = &self.backoff
        {
            if self.interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "interval",
                    reason: "exponential backoff needs a non-zero base interval".into(),
                });
            }
            if !multiplier.is_finite() || *multiplier < 1.0 {
                return Err(ConfigError::InvalidValue {
                    field: "multiplier",
                    reason: format!("must be a finite value >= 1.0, got {multiplier}"),
                });
            }
            if *max_interval < self.interval {
                return Err(ConfigError::InvalidValue {
                    field: "max_interval",
                    reason: format!(
                        "{max_interval:?} is below the base interval {:?}",
                        self.interval
                    ),
                });
            }
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidValue {
                field: "deadline",
                reason: "must be greater than zero when set".into(),
            });
        }
        Ok(())
    }
}

/// Call `probe` until it reports [`Probe::Ready`]
///
/// Sleeps only between pending checks, never after the resolving one. With no
/// deadline a probe that stays pending keeps the loop alive indefinitely.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    operation: &str,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);

        if let Probe::Ready(value) = probe().await.map_err(PollError::Probe)? {
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if let Some(deadline) = policy.deadline
            && elapsed >= deadline
        {
            tracing::warn!(
                operation,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "Polling deadline exceeded"
            );
            return Err(PollError::Deadline {
                operation: operation.to_string(),
                elapsed,
                attempts,
            });
        }

        let delay = policy.delay_for(attempts - 1);
        tracing::debug!(
            operation,
            attempts,
            delay_ms = delay.as_millis() as u64,
            "Still pending"
        );
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_is_five_second_fixed_without_deadline() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.backoff, Backoff::Fixed);
        assert_eq!(policy.deadline, None);
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 200)]
    #[case(2, 400)]
    #[case(3, 800)]
    #[case(4, 1_000)]
    #[case(60, 1_000)]
    fn exponential_delay_is_capped(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = PollPolicy::fixed(Duration::from_millis(100))
            .with_exponential_backoff(2.0, Duration::from_secs(1));
        assert_eq!(policy.delay_for(attempt), Duration::from_millis(expected_ms));
    }

    #[rstest]
    #[case::zero_base(PollPolicy::immediate().with_exponential_backoff(2.0, Duration::from_secs(1)), "interval")]
    #[case::shrinking(PollPolicy::fixed(Duration::from_secs(1)).with_exponential_backoff(0.5, Duration::from_secs(5)), "multiplier")]
    #[case::cap_below_base(PollPolicy::fixed(Duration::from_secs(10)).with_exponential_backoff(2.0, Duration::from_secs(5)), "max_interval")]
    #[case::zero_deadline(PollPolicy::default().with_deadline(Duration::ZERO), "deadline")]
    fn rejects_invalid_policies(#[case] policy: PollPolicy, #[case] field: &str) {
        let ConfigError::InvalidValue { field: got, .. } = policy.validate().unwrap_err();
        assert_eq!(got, field);
    }

    #[test]
    fn policy_round_trips_through_humantime() {
        let json = r#"{"interval":"2s","backoff":{"kind":"exponential","multiplier":1.5,"max_interval":"30s"},"deadline":"10m"}"#;
        let policy: PollPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.deadline, Some(Duration::from_secs(600)));
        assert!(policy.validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_fixed_interval_between_pending_checks() {
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let value = poll_until(&PollPolicy::default(), "test", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                Ok::<_, ()>(if n < 3 { Probe::Pending } else { Probe::Ready(n) })
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        // Two pending checks, two sleeps, none after the resolving check.
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_a_probe_that_never_resolves() {
        let policy = PollPolicy::default().with_deadline(Duration::from_secs(12));
        let err = poll_until(&policy, "stuck", || async { Ok::<Probe<()>, ()>(Probe::Pending) })
            .await
            .unwrap_err();

        match err {
            PollError::Deadline {
                operation,
                attempts,
                elapsed,
            } => {
                assert_eq!(operation, "stuck");
                assert_eq!(attempts, 4);
                assert_eq!(elapsed, Duration::from_secs(15));
            }
            PollError::Probe(()) => panic!("expected deadline"),
        }
    }

    #[tokio::test]
    async fn probe_error_ends_the_loop() {
        let err = poll_until(&PollPolicy::immediate(), "broken", || async {
            Err::<Probe<()>, _>("transport down")
        })
        .await
        .unwrap_err();
        assert_eq!(err.into_probe(), Some("transport down"));
    }
}
