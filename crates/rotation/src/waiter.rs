//! Work request waiter
//!
//! Polls one work request at a time until it reaches `SUCCEEDED` or `FAILED`.
//! Holds no state between waits.

use std::sync::Arc;

use lbcert_cloud::{LoadBalancerApi, WorkRequest, WorkRequestId, WorkRequestState};
use lbcert_resilience::{PollError, PollPolicy, Probe, poll_until};

use crate::error::{RotationError, RotationResult};

/// Blocks until work requests are terminal
#[derive(Clone)]
pub struct WorkRequestWaiter {
    api: Arc<dyn LoadBalancerApi>,
    policy: PollPolicy,
}

impl std::fmt::Debug for WorkRequestWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkRequestWaiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl WorkRequestWaiter {
    /// Waiter polling through `api` under `policy`
    pub fn new(api: Arc<dyn LoadBalancerApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Wait for `id` to finish
    ///
    /// Returns the terminal snapshot on `SUCCEEDED`. `FAILED` becomes
    /// [`RotationError::OperationFailed`]; an elapsed policy deadline becomes
    /// [`RotationError::WaitTimedOut`].
    pub async fn wait(&self, id: &WorkRequestId) -> RotationResult<WorkRequest> {
        let result = poll_until(&self.policy, "get_work_request", || async {
            self.api.get_work_request(id).await.map(|snapshot| {
                if snapshot.state.is_terminal() {
                    Probe::Ready(snapshot)
                } else {
                    tracing::trace!(work_request = %id, state = %snapshot.state, "Work request pending");
                    Probe::Pending
                }
            })
        })
        .await;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(PollError::Deadline { elapsed, .. }) => {
                return Err(RotationError::WaitTimedOut {
                    work_request: id.clone(),
                    elapsed,
                });
            }
            Err(PollError::Probe(source)) => {
                return Err(RotationError::cloud("get_work_request", source));
            }
        };

        match snapshot.state {
            WorkRequestState::Succeeded => Ok(snapshot),
            _ => Err(RotationError::OperationFailed {
                work_request: id.clone(),
                message: snapshot.failure_message(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lbcert_cloud::mock::{MockCall, MockLoadBalancer, MockOperation, MockTarget};
    use lbcert_cloud::{NewCertificate, WorkRequestState::*};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use secrecy::SecretString;

    use super::*;

    const LB: &str = "ocid1.loadbalancer.oc1..test";

    async fn submit(mock: &MockLoadBalancer, name: &str) -> WorkRequestId {
        mock.create_certificate(
            LB,
            &NewCertificate {
                certificate_name: name.to_owned(),
                private_key: SecretString::from("KEY".to_string()),
                public_certificate: "CHAIN".to_owned(),
                passphrase: None,
            },
        )
        .await
        .unwrap()
    }

    fn polled_states(mock: &MockLoadBalancer) -> Vec<WorkRequestState> {
        mock.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::GetWorkRequest { state, .. } => state,
                _ => None,
            })
            .collect()
    }

    #[rstest]
    #[case::immediate(vec![Succeeded])]
    #[case::long_queue(vec![Accepted, Accepted, InProgress, InProgress, Succeeded])]
    #[tokio::test]
    async fn returns_only_once_succeeded(#[case] script: Vec<WorkRequestState>) {
        // GIVEN
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB));
        mock.script(MockTarget::CreateCertificate("c".into()), script.clone());
        let id = submit(&mock, "c").await;
        let waiter = WorkRequestWaiter::new(mock.clone(), PollPolicy::immediate());

        // WHEN
        let done = waiter.wait(&id).await.unwrap();

        // THEN
        assert_eq!(done.state, Succeeded);
        assert_eq!(polled_states(&mock), script);
    }

    #[tokio::test]
    async fn failed_work_request_is_an_error_with_the_service_message() {
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB));
        mock.script(MockTarget::CreateCertificate("c".into()), [Accepted, Failed]);
        let id = submit(&mock, "c").await;
        let waiter = WorkRequestWaiter::new(mock.clone(), PollPolicy::immediate());

        match waiter.wait(&id).await {
            Err(RotationError::OperationFailed {
                work_request,
                message,
            }) => {
                assert_eq!(work_request, id);
                assert_eq!(message, format!("work request {id} failed"));
            }
            other => panic!("expected OperationFailed, got {other:?}"),
        }
        assert_eq!(polled_states(&mock), vec![Accepted, Failed]);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_the_policy_interval_between_checks() {
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB));
        mock.script(MockTarget::CreateCertificate("c".into()), [Accepted, InProgress, Succeeded]);
        let id = submit(&mock, "c").await;
        let waiter = WorkRequestWaiter::new(mock.clone(), PollPolicy::default());
        let started = tokio::time::Instant::now();

        waiter.wait(&id).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_into_wait_timed_out() {
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB));
        mock.script(MockTarget::CreateCertificate("c".into()), [InProgress]);
        let id = submit(&mock, "c").await;
        let policy = PollPolicy::fixed(Duration::from_secs(1)).with_deadline(Duration::from_secs(3));
        let waiter = WorkRequestWaiter::new(mock.clone(), policy);

        let err = waiter.wait(&id).await.unwrap_err();

        assert!(
            matches!(err, RotationError::WaitTimedOut { ref work_request, elapsed } if *work_request == id && elapsed >= Duration::from_secs(3)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn transport_failure_while_polling_is_a_cloud_error() {
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB));
        let id = submit(&mock, "c").await;
        mock.fail_call(MockOperation::GetWorkRequest, 500);
        let waiter = WorkRequestWaiter::new(mock.clone(), PollPolicy::immediate());

        let err = waiter.wait(&id).await.unwrap_err();

        assert!(matches!(
            err,
            RotationError::Cloud {
                operation: "get_work_request",
                ..
            }
        ));
    }
}
