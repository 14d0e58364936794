//! ACME issuance over DNS-01

use std::time::Duration;

use async_trait::async_trait;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, Order,
    OrderStatus,
};
use lbcert_resilience::{PollError, PollPolicy, Probe, poll_until};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{AcquisitionError, AcquisitionResult};
use crate::key::{CertificateKey, KeyAlgorithm};
use crate::solver::{ChallengeRecords, Dns01Solver};
use crate::source::{CertificateSource, IssuedCertificate};

/// Let's Encrypt production directory
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Issuer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcmeConfig {
    /// ACME directory URL
    pub directory_url: String,

    /// Account contact address, without `mailto:`
    #[serde(default)]
    pub contact_email: Option<String>,

    /// Key type of the issued certificate
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,

    /// Pause between publishing records and asking for validation
    #[serde(with = "humantime_serde")]
    pub propagation_delay: Duration,

    /// Order status polling; its deadline bounds the wait for validation and,
    /// separately, the wait for the issued chain
    pub order_poll: PollPolicy,
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            directory_url: LETS_ENCRYPT_PRODUCTION.to_owned(),
            contact_email: None,
            key_algorithm: KeyAlgorithm::default(),
            propagation_delay: Duration::from_secs(30),
            order_poll: PollPolicy::fixed(Duration::from_secs(3))
                .with_deadline(Duration::from_secs(300)),
        }
    }
}

impl AcmeConfig {
    /// Production directory with `contact` as account address
    pub fn production(contact: Option<String>) -> Self {
        Self {
            contact_email: contact,
            ..Self::default()
        }
    }

    /// Staging directory, for dry runs
    pub fn staging(contact: Option<String>) -> Self {
        Self {
            directory_url: LETS_ENCRYPT_STAGING.to_owned(),
            contact_email: contact,
            ..Self::default()
        }
    }
}

/// Obtains certificates from an ACME CA, proving control through `S`
#[derive(Debug)]
pub struct AcmeIssuer<S> {
    config: AcmeConfig,
    solver: S,
}

impl<S: Dns01Solver> AcmeIssuer<S> {
    /// Issuer using `solver` for DNS-01
    pub fn new(config: AcmeConfig, solver: S) -> Self {
        Self { config, solver }
    }

    /// Settings in use
    pub fn config(&self) -> &AcmeConfig {
        &self.config
    }

    async fn account(&self) -> AcquisitionResult<Account> {
        let contact = self
            .config
            .contact_email
            .as_deref()
            .map(|email| format!("mailto:{email}"));
        let contact_refs: Vec<&str> = contact.iter().map(String::as_str).collect();

        tracing::info!(directory = %self.config.directory_url, "Registering ACME account");
        let (account, _credentials) = Account::create(
            &NewAccount {
                contact: &contact_refs,
                terms_of_service_agreed: true,
                only_return_existing: false,
            },
            &self.config.directory_url,
            None,
        )
        .await
        .map_err(|e| AcquisitionError::acme("new_account", e))?;
        Ok(account)
    }

    /// Publish a record per pending authorization and mark the challenges ready
    async fn publish_challenges(
        &self,
        order: &mut Order,
        records: &mut ChallengeRecords<'_, S>,
    ) -> AcquisitionResult<()> {
        let authorizations = order
            .authorizations()
            .await
            .map_err(|e| AcquisitionError::acme("authorizations", e))?;

        let mut ready = Vec::new();
        for authorization in &authorizations {
            let Identifier::Dns(domain) = &authorization.identifier;
            if authorization.status == AuthorizationStatus::Valid {
                tracing::debug!(%domain, "Authorization already valid");
                continue;
            }

            let challenge = authorization
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Dns01)
                .ok_or_else(|| AcquisitionError::NoDnsChallenge {
                    domain: domain.clone(),
                })?;
            let value = order.key_authorization(challenge).dns_value();

            records.present(domain, &value).await?;
            ready.push(challenge.url.clone());
        }

        if ready.is_empty() {
            return Ok(());
        }
        tracing::info!(
            records = ready.len(),
            delay_secs = self.config.propagation_delay.as_secs(),
            "Waiting for DNS propagation"
        );
        sleep(self.config.propagation_delay).await;

        for url in &ready {
            order
                .set_challenge_ready(url)
                .await
                .map_err(|e| AcquisitionError::acme("challenge_ready", e))?;
        }
        Ok(())
    }

    /// Refresh until the order is `Ready` (or already `Valid`)
    async fn wait_until_ready(&self, order: &mut Order) -> AcquisitionResult<OrderStatus> {
        let order = Mutex::new(order);
        let result = poll_until(&self.config.order_poll, "acme_order_ready", || async {
            let mut order = order.lock().await;
            let state = match order.refresh().await {
                Ok(state) => state,
                Err(e) => return Err(AcquisitionError::acme("refresh_order", e)),
            };
            match state.status {
                OrderStatus::Ready | OrderStatus::Valid => Ok(Probe::Ready(state.status)),
                OrderStatus::Pending | OrderStatus::Processing => Ok(Probe::Pending),
                OrderStatus::Invalid => Err(AcquisitionError::OrderInvalid {
                    reason: state
                        .error
                        .as_ref()
                        .and_then(|problem| problem.detail.clone())
                        .unwrap_or_else(|| "no problem document".to_owned()),
                }),
            }
        })
        .await;
        settle(result, &order).await
    }

    /// Fetch the chain once the CA has issued it
    async fn download(&self, order: &mut Order) -> AcquisitionResult<String> {
        let order = Mutex::new(order);
        let result = poll_until(&self.config.order_poll, "acme_certificate", || async {
            match order.lock().await.certificate().await {
                Ok(Some(chain)) => Ok(Probe::Ready(chain)),
                Ok(None) => Ok(Probe::Pending),
                Err(e) => Err(AcquisitionError::acme("certificate", e)),
            }
        })
        .await;
        settle(result, &order).await
    }

    async fn issue(
        &self,
        domains: &[String],
        records: &mut ChallengeRecords<'_, S>,
    ) -> AcquisitionResult<IssuedCertificate> {
        let account = self.account().await?;
        let identifiers: Vec<Identifier> = domains.iter().cloned().map(Identifier::Dns).collect();
        let mut order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await
            .map_err(|e| AcquisitionError::acme("new_order", e))?;

        self.publish_challenges(&mut order, records).await?;
        let status = self.wait_until_ready(&mut order).await?;

        let key = CertificateKey::generate(self.config.key_algorithm)?;
        if status != OrderStatus::Valid {
            let csr = key.signing_request(domains)?;
            order
                .finalize(&csr)
                .await
                .map_err(|e| AcquisitionError::acme("finalize", e))?;
        }
        let certificate_chain_pem = self.download(&mut order).await?;

        Ok(IssuedCertificate {
            private_key_pem: key.into_pem(),
            certificate_chain_pem,
        })
    }
}

/// Map a finished order poll, naming the last seen status on timeout
async fn settle<T>(
    result: Result<T, PollError<AcquisitionError>>,
    order: &Mutex<&mut Order>,
) -> AcquisitionResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(PollError::Probe(error)) => Err(error),
        Err(PollError::Deadline { elapsed, .. }) => Err(AcquisitionError::OrderTimedOut {
            status: format!("{:?}", order.lock().await.state().status),
            elapsed,
        }),
    }
}

#[async_trait]
impl<S: Dns01Solver> CertificateSource for AcmeIssuer<S> {
    async fn acquire(&self, domains: &[String]) -> AcquisitionResult<IssuedCertificate> {
        if domains.is_empty() {
            return Err(AcquisitionError::NoDomains);
        }
        tracing::info!(?domains, algorithm = %self.config.key_algorithm, "Requesting certificate");

        let mut records = ChallengeRecords::new(&self.solver);
        let result = self.issue(domains, &mut records).await;
        let leftover = records.clear().await;
        if leftover > 0 {
            tracing::warn!(leftover, "Some DNS-01 challenge records must be removed by hand");
        }

        if let Ok(issued) = &result {
            tracing::info!(certificates = issued.certificate_count(), "Certificate issued");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lbcert_cloud::mock::MockDns;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::solver::OciDnsSolver;

    #[test]
    fn defaults_target_production_with_rsa() {
        let config = AcmeConfig::production(Some("ops@example.org".into()));
        assert_eq!(config.directory_url, LETS_ENCRYPT_PRODUCTION);
        assert_eq!(config.key_algorithm, KeyAlgorithm::Rsa2048);
        assert_eq!(config.order_poll.deadline, Some(Duration::from_secs(300)));
        assert!(config.order_poll.validate().is_ok());
        assert_eq!(AcmeConfig::staging(None).directory_url, LETS_ENCRYPT_STAGING);
    }

    #[tokio::test]
    async fn empty_domain_list_fails_before_contacting_the_ca() {
        let dns = Arc::new(MockDns::new());
        let issuer = AcmeIssuer::new(
            AcmeConfig {
                directory_url: "http://127.0.0.1:9/directory".into(),
                ..AcmeConfig::default()
            },
            OciDnsSolver::new(dns.clone(), "example.org"),
        );

        let err = issuer.acquire(&[]).await.unwrap_err();

        assert!(matches!(err, AcquisitionError::NoDomains));
        assert!(dns.patches().is_empty());
    }
}
