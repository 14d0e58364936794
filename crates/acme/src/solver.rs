//! DNS-01 challenge solvers

use std::sync::Arc;

use async_trait::async_trait;
use lbcert_cloud::{DnsApi, RecordOperation, RecordOperationKind};

use crate::error::{AcquisitionError, AcquisitionResult};

/// TTL of challenge records, in seconds
pub const DEFAULT_CHALLENGE_TTL: u32 = 30;

/// Record name the CA queries for `domain`
///
/// A wildcard identifier is validated on its base name.
pub fn challenge_record_name(domain: &str) -> String {
    let base = domain.strip_prefix("*.").unwrap_or(domain);
    format!("_acme-challenge.{}", base.trim_end_matches('.'))
}

/// Publishes and removes DNS-01 validation records
#[async_trait]
pub trait Dns01Solver: Send + Sync {
    /// Publish `value` for `domain`
    async fn present(&self, domain: &str, value: &str) -> AcquisitionResult<()>;

    /// Remove what [`present`](Self::present) published
    async fn cleanup(&self, domain: &str, value: &str) -> AcquisitionResult<()>;
}

/// Solver writing TXT records to an OCI DNS zone
#[derive(Clone)]
pub struct OciDnsSolver {
    dns: Arc<dyn DnsApi>,
    zone: String,
    ttl: u32,
}

impl std::fmt::Debug for OciDnsSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciDnsSolver")
            .field("zone", &self.zone)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl OciDnsSolver {
    /// Solver for records in `zone` (name or OCID)
    pub fn new(dns: Arc<dyn DnsApi>, zone: impl Into<String>) -> Self {
        Self {
            dns,
            zone: zone.into(),
            ttl: DEFAULT_CHALLENGE_TTL,
        }
    }

    /// Override the record TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    async fn patch(
        &self,
        kind: RecordOperationKind,
        domain: &str,
        value: &str,
    ) -> AcquisitionResult<()> {
        let record = challenge_record_name(domain);
        let operation = RecordOperation::txt(kind, record.clone(), value, self.ttl);
        self.dns
            .patch_records(&self.zone, &record, &[operation])
            .await
            .map_err(|source| AcquisitionError::Dns {
                domain: domain.to_owned(),
                source,
            })
    }
}

#[async_trait]
impl Dns01Solver for OciDnsSolver {
    async fn present(&self, domain: &str, value: &str) -> AcquisitionResult<()> {
        tracing::info!(%domain, zone = %self.zone, "Publishing DNS-01 challenge record");
        self.patch(RecordOperationKind::Add, domain, value).await
    }

    async fn cleanup(&self, domain: &str, value: &str) -> AcquisitionResult<()> {
        tracing::debug!(%domain, zone = %self.zone, "Removing DNS-01 challenge record");
        self.patch(RecordOperationKind::Remove, domain, value).await
    }
}

/// Records published for one issuance, removed together by [`ChallengeRecords::clear`]
pub(crate) struct ChallengeRecords<'a, S: ?Sized> {
    solver: &'a S,
    published: Vec<(String, String)>,
}

impl<'a, S: Dns01Solver + ?Sized> ChallengeRecords<'a, S> {
    pub(crate) fn new(solver: &'a S) -> Self {
        Self {
            solver,
            published: Vec::new(),
        }
    }

    /// Publish `value` for `domain`; only successful publications are tracked
    pub(crate) async fn present(&mut self, domain: &str, value: &str) -> AcquisitionResult<()> {
        self.solver.present(domain, value).await?;
        self.published.push((domain.to_owned(), value.to_owned()));
        Ok(())
    }

    /// Remove every tracked record; failures are logged and do not stop the sweep
    ///
    /// Returns the number of records that could not be removed.
    pub(crate) async fn clear(self) -> usize {
        let mut failed = 0;
        for (domain, value) in &self.published {
            if let Err(error) = self.solver.cleanup(domain, value).await {
                tracing::warn!(%domain, %error, "Failed to remove DNS-01 challenge record");
                failed += 1;
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use lbcert_cloud::mock::MockDns;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("example.org", "_acme-challenge.example.org")]
    #[case("*.example.org", "_acme-challenge.example.org")]
    #[case("www.example.org.", "_acme-challenge.www.example.org")]
    fn record_names(#[case] domain: &str, #[case] expected: &str) {
        assert_eq!(challenge_record_name(domain), expected);
    }

    #[tokio::test]
    async fn present_then_cleanup_leaves_the_zone_empty() {
        // GIVEN
        let dns = Arc::new(MockDns::new());
        let solver = OciDnsSolver::new(dns.clone(), "example.org").with_ttl(60);

        // WHEN
        solver.present("www.example.org", "token-digest").await.unwrap();
        let published = dns.records("example.org");
        solver.cleanup("www.example.org", "token-digest").await.unwrap();

        // THEN
        assert_eq!(
            published.into_iter().collect::<Vec<_>>(),
            vec![(
                "_acme-challenge.www.example.org".to_string(),
                "TXT".to_string(),
                "token-digest".to_string()
            )]
        );
        assert!(dns.records("example.org").is_empty());
        let patches = dns.patches();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].operations[0].ttl, 60);
        assert_eq!(patches[1].operations[0].operation, RecordOperationKind::Remove);
    }

    #[tokio::test]
    async fn zone_rejection_names_the_domain() {
        let dns = Arc::new(MockDns::new());
        dns.fail_with(404);
        let solver = OciDnsSolver::new(dns, "example.org");

        let err = solver.present("example.org", "v").await.unwrap_err();

        match err {
            AcquisitionError::Dns { domain, source } => {
                assert_eq!(domain, "example.org");
                assert!(source.is_not_found());
            }
            other => panic!("expected Dns error, got {other:?}"),
        }
    }

    /// Solver that remembers every call and fails on chosen domains
    #[derive(Default)]
    struct ScriptedSolver {
        calls: parking_lot::Mutex<Vec<(&'static str, String)>>,
        reject_present: Option<&'static str>,
        reject_cleanup: Option<&'static str>,
    }

    impl ScriptedSolver {
        fn calls(&self) -> Vec<(&'static str, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Dns01Solver for ScriptedSolver {
        async fn present(&self, domain: &str, _value: &str) -> AcquisitionResult<()> {
            self.calls.lock().push(("present", domain.to_owned()));
            if self.reject_present == Some(domain) {
                return Err(AcquisitionError::NoDnsChallenge {
                    domain: domain.to_owned(),
                });
            }
            Ok(())
        }

        async fn cleanup(&self, domain: &str, _value: &str) -> AcquisitionResult<()> {
            self.calls.lock().push(("cleanup", domain.to_owned()));
            if self.reject_cleanup == Some(domain) {
                return Err(AcquisitionError::NoDnsChallenge {
                    domain: domain.to_owned(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn records_published_before_a_failure_are_all_removed() {
        // GIVEN a solver that rejects the third domain
        let solver = ScriptedSolver {
            reject_present: Some("c.example.org"),
            ..ScriptedSolver::default()
        };
        let mut records = ChallengeRecords::new(&solver);

        // WHEN issuance stops at that domain
        records.present("a.example.org", "va").await.unwrap();
        records.present("b.example.org", "vb").await.unwrap();
        let err = records.present("c.example.org", "vc").await.unwrap_err();
        let leftover = records.clear().await;

        // THEN the error is preserved and exactly the published records are removed
        assert!(matches!(err, AcquisitionError::NoDnsChallenge { ref domain } if domain == "c.example.org"));
        assert_eq!(leftover, 0);
        assert_eq!(
            solver.calls(),
            vec![
                ("present", "a.example.org".to_string()),
                ("present", "b.example.org".to_string()),
                ("present", "c.example.org".to_string()),
                ("cleanup", "a.example.org".to_string()),
                ("cleanup", "b.example.org".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_removal_does_not_stop_the_sweep() {
        let solver = ScriptedSolver {
            reject_cleanup: Some("a.example.org"),
            ..ScriptedSolver::default()
        };
        let mut records = ChallengeRecords::new(&solver);
        records.present("a.example.org", "va").await.unwrap();
        records.present("b.example.org", "vb").await.unwrap();

        let leftover = records.clear().await;

        assert_eq!(leftover, 1);
        assert!(solver.calls().contains(&("cleanup", "b.example.org".to_string())));
    }

    #[tokio::test]
    async fn clearing_with_nothing_published_calls_nothing() {
        let solver = ScriptedSolver::default();

        let leftover = ChallengeRecords::new(&solver).clear().await;

        assert_eq!(leftover, 0);
        assert!(solver.calls().is_empty());
    }
}
