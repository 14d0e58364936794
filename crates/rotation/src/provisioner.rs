//! Registers the new certificate with the load balancer

use std::sync::Arc;

use lbcert_cloud::{LoadBalancerApi, NewCertificate, WorkRequestId};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{RotationError, RotationResult};
use crate::events::{RotationEvent, RotationObserver, WorkKind};
use crate::request::CertificateBundle;

/// Submits create-certificate; never waits
pub struct CertificateProvisioner {
    api: Arc<dyn LoadBalancerApi>,
    observer: Arc<dyn RotationObserver>,
}

impl CertificateProvisioner {
    /// Provisioner reporting submissions to `observer`
    pub fn new(api: Arc<dyn LoadBalancerApi>, observer: Arc<dyn RotationObserver>) -> Self {
        Self { api, observer }
    }

    /// Submit `bundle` to `load_balancer_id`
    pub async fn create(
        &self,
        load_balancer_id: &str,
        bundle: &CertificateBundle,
    ) -> RotationResult<WorkRequestId> {
        let body = NewCertificate {
            certificate_name: bundle.name.clone(),
            private_key: SecretString::from(bundle.private_key.expose_secret().to_owned()),
            public_certificate: bundle.certificate_chain.clone(),
            passphrase: None,
        };

        let work_request = self
            .api
            .create_certificate(load_balancer_id, &body)
            .await
            .map_err(|e| RotationError::cloud("create_certificate", e))?;

        self.observer.notify(&RotationEvent::WorkRequestSubmitted {
            kind: WorkKind::CreateCertificate,
            target: bundle.name.clone(),
            work_request: work_request.clone(),
        });
        Ok(work_request)
    }
}

#[cfg(test)]
mod tests {
    use lbcert_cloud::mock::{MockCall, MockLoadBalancer, MockOperation};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::events::RecordingObserver;

    const LB: &str = "ocid1.loadbalancer.oc1..test";

    fn bundle(name: &str) -> CertificateBundle {
        CertificateBundle::new(name, SecretString::from("KEY".to_string()), "CHAIN")
    }

    #[tokio::test]
    async fn submits_without_waiting() {
        // GIVEN
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB));
        let recorder = Arc::new(RecordingObserver::new());
        let provisioner = CertificateProvisioner::new(mock.clone(), recorder.clone());

        // WHEN
        let id = provisioner.create(LB, &bundle("new-1")).await.unwrap();

        // THEN
        assert_eq!(
            mock.calls(),
            vec![MockCall::CreateCertificate {
                load_balancer: LB.into(),
                certificate: "new-1".into(),
                chain: "CHAIN".into(),
                work_request: Some(id.clone()),
            }]
        );
        assert_eq!(mock.count(MockOperation::GetWorkRequest), 0);
        assert_eq!(
            recorder.submitted(WorkKind::CreateCertificate),
            vec!["new-1".to_string()]
        );
        // Nothing exists until the work request succeeds.
        assert!(mock.certificate_names(LB).is_empty());
    }

    #[tokio::test]
    async fn rejected_submission_is_a_cloud_error_and_not_reported() {
        let mock = Arc::new(MockLoadBalancer::new().with_load_balancer(LB).with_certificate(LB, "new-1"));
        let recorder = Arc::new(RecordingObserver::new());
        let provisioner = CertificateProvisioner::new(mock.clone(), recorder.clone());

        let err = provisioner.create(LB, &bundle("new-1")).await.unwrap_err();

        match err {
            RotationError::Cloud { operation, source } => {
                assert_eq!(operation, "create_certificate");
                assert_eq!(source.http_status(), Some(409));
            }
            other => panic!("expected cloud error, got {other:?}"),
        }
        assert!(recorder.events().is_empty());
    }
}
