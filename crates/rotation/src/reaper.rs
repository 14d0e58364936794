//! Deletes superseded certificates

use std::sync::Arc;

use lbcert_cloud::{LoadBalancerApi, WorkRequestId};
use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};
use crate::events::{RotationEvent, RotationObserver, WorkKind};

/// Handling of a certificate that is already gone when its delete is sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentCertificate {
    /// Treat a not-found response as already reaped
    #[default]
    Skip,
    /// Surface the not-found response as an error
    Fail,
}

/// Result of [`CertificateReaper::reap`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapOutcome {
    /// Submitted deletes, in input order
    pub submissions: Vec<(String, WorkRequestId)>,
    /// Certificates that did not exist
    pub already_absent: Vec<String>,
}

/// Submits delete-certificate for each name; never waits
pub struct CertificateReaper {
    api: Arc<dyn LoadBalancerApi>,
    absent: AbsentCertificate,
    observer: Arc<dyn RotationObserver>,
}

impl CertificateReaper {
    /// Reaper with the given absent-certificate handling
    pub fn new(
        api: Arc<dyn LoadBalancerApi>,
        absent: AbsentCertificate,
        observer: Arc<dyn RotationObserver>,
    ) -> Self {
        Self {
            api,
            absent,
            observer,
        }
    }

    /// Submit one delete per name
    pub async fn reap<S: AsRef<str>>(
        &self,
        load_balancer_id: &str,
        certificates: &[S],
    ) -> RotationResult<ReapOutcome> {
        let mut outcome = ReapOutcome::default();
        for name in certificates {
            let name = name.as_ref();
            match self.api.delete_certificate(load_balancer_id, name).await {
                Ok(work_request) => {
                    self.observer.notify(&RotationEvent::WorkRequestSubmitted {
                        kind: WorkKind::DeleteCertificate,
                        target: name.to_owned(),
                        work_request: work_request.clone(),
                    });
                    outcome.submissions.push((name.to_owned(), work_request));
                }
                Err(e) if e.is_not_found() && self.absent == AbsentCertificate::Skip => {
                    self.observer.notify(&RotationEvent::CertificateAlreadyAbsent {
                        certificate: name.to_owned(),
                    });
                    outcome.already_absent.push(name.to_owned());
                }
                Err(e) => return Err(RotationError::cloud("delete_certificate", e)),
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use lbcert_cloud::mock::{MockLoadBalancer, MockOperation};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::events::RecordingObserver;

    const LB: &str = "ocid1.loadbalancer.oc1..test";

    fn mock() -> Arc<MockLoadBalancer> {
        Arc::new(
            MockLoadBalancer::new()
                .with_load_balancer(LB)
                .with_certificate(LB, "old-1")
                .with_certificate(LB, "old-2"),
        )
    }

    #[tokio::test]
    async fn submits_one_delete_per_name_without_waiting() {
        // GIVEN
        let mock = mock();
        let recorder = Arc::new(RecordingObserver::new());
        let reaper = CertificateReaper::new(mock.clone(), AbsentCertificate::Skip, recorder.clone());

        // WHEN
        let outcome = reaper.reap(LB, &["old-1", "old-2"]).await.unwrap();

        // THEN
        let names: Vec<&str> = outcome.submissions.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["old-1", "old-2"]);
        assert_eq!(mock.count(MockOperation::DeleteCertificate), 2);
        assert_eq!(mock.count(MockOperation::GetWorkRequest), 0);
        assert_eq!(
            recorder.submitted(WorkKind::DeleteCertificate),
            vec!["old-1".to_string(), "old-2".to_string()]
        );
    }

    #[tokio::test]
    async fn skip_records_absent_certificates_and_continues() {
        let mock = mock();
        let recorder = Arc::new(RecordingObserver::new());
        let reaper = CertificateReaper::new(mock.clone(), AbsentCertificate::Skip, recorder.clone());

        let outcome = reaper.reap(LB, &["gone", "old-2"]).await.unwrap();

        assert_eq!(outcome.already_absent, vec!["gone".to_string()]);
        assert_eq!(outcome.submissions.len(), 1);
        assert!(recorder.events().contains(&RotationEvent::CertificateAlreadyAbsent {
            certificate: "gone".into()
        }));
    }

    #[tokio::test]
    async fn fail_surfaces_absent_certificates() {
        let mock = mock();
        let reaper = CertificateReaper::new(
            mock.clone(),
            AbsentCertificate::Fail,
            Arc::new(RecordingObserver::new()),
        );

        let err = reaper.reap(LB, &["gone", "old-2"]).await.unwrap_err();

        match err {
            RotationError::Cloud { operation, source } => {
                assert_eq!(operation, "delete_certificate");
                assert!(source.is_not_found());
            }
            other => panic!("expected cloud error, got {other:?}"),
        }
        assert_eq!(mock.count(MockOperation::DeleteCertificate), 1);
    }

    #[tokio::test]
    async fn other_failures_are_never_skipped() {
        let mock = mock();
        mock.fail_call_for(MockOperation::DeleteCertificate, "old-1", 503);
        let reaper = CertificateReaper::new(
            mock.clone(),
            AbsentCertificate::Skip,
            Arc::new(RecordingObserver::new()),
        );

        let err = reaper.reap(LB, &["old-1"]).await.unwrap_err();

        assert!(matches!(err, RotationError::Cloud { ref source, .. } if source.http_status() == Some(503)));
    }
}
