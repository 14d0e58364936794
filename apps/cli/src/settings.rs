//! Settings shared by every command

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Args;
use lbcert_cloud::{
    ApiKeyCredentials, CloudConfig, Endpoints, HttpDnsClient, HttpLoadBalancerClient,
    HttpObjectStorageClient, OciClient,
};
use secrecy::SecretString;

/// Identity, region and target load balancer
#[derive(Args, Debug)]
pub struct CloudArgs {
    /// Load balancer OCID
    #[arg(long = "load-balancer", env = "OCI_LB_OCID")]
    pub load_balancer: Option<String>,

    /// Region identifier, e.g. us-ashburn-1
    #[arg(long, env = "OCI_REGION")]
    pub region: Option<String>,

    /// Tenancy OCID
    #[arg(long, env = "OCI_TENANCY_OCID")]
    pub tenancy: Option<String>,

    /// User OCID the API key belongs to
    #[arg(long, env = "OCI_USER_OCID")]
    pub user: Option<String>,

    /// Fingerprint of the API public key
    #[arg(long, env = "OCI_PUBKEY_FINGERPRINT")]
    pub fingerprint: Option<String>,

    /// API private key PEM, base64-encoded
    #[arg(long = "private-key-base64", env = "OCI_PRIVKEY_BASE64", hide_env_values = true)]
    pub private_key_base64: Option<String>,

    /// Passphrase of the API private key
    #[arg(long = "private-key-pass", env = "OCI_PRIVKEY_PASS", hide_env_values = true)]
    pub private_key_pass: Option<String>,

    /// Send every API call to this base URL instead of the region's endpoints
    #[arg(long, env = "LBCERT_ENDPOINT")]
    pub endpoint: Option<String>,
}

/// Signed clients for the three services
pub(crate) struct Clients {
    pub load_balancer: Arc<HttpLoadBalancerClient>,
    pub object_storage: Arc<HttpObjectStorageClient>,
    pub dns: Arc<HttpDnsClient>,
}

impl CloudArgs {
    /// Target load balancer OCID
    pub(crate) fn load_balancer_id(&self) -> anyhow::Result<String> {
        require(self.load_balancer.as_deref(), "OCI_LB_OCID", "--load-balancer")
    }

    /// Check every value needed to sign requests and build the configuration
    pub(crate) fn cloud_config(&self) -> anyhow::Result<CloudConfig> {
        let region = require(self.region.as_deref(), "OCI_REGION", "--region")?;
        let tenancy = require(self.tenancy.as_deref(), "OCI_TENANCY_OCID", "--tenancy")?;
        let user = require(self.user.as_deref(), "OCI_USER_OCID", "--user")?;
        let fingerprint = require(
            self.fingerprint.as_deref(),
            "OCI_PUBKEY_FINGERPRINT",
            "--fingerprint",
        )?;
        let key = require(
            self.private_key_base64.as_deref(),
            "OCI_PRIVKEY_BASE64",
            "--private-key-base64",
        )?;
        let passphrase = self
            .private_key_pass
            .clone()
            .map(SecretString::from);

        let credentials =
            ApiKeyCredentials::from_base64_key(tenancy, user, fingerprint, &key, passphrase)
                .context("invalid API key (OCI_PRIVKEY_BASE64)")?;
        let mut config = CloudConfig::new(region, credentials).context("invalid OCI_REGION")?;
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoints(
                Endpoints::single(endpoint).context("invalid LBCERT_ENDPOINT")?,
            );
        }
        config.validate().context("invalid OCI API credentials")?;
        Ok(config)
    }

    /// Build the signed clients
    pub(crate) fn connect(&self) -> anyhow::Result<Clients> {
        let config = self.cloud_config()?;
        tracing::debug!(region = %config.region, "Connecting to OCI");
        let client = OciClient::new(&config).context("failed to build the OCI client")?;
        Ok(Clients {
            load_balancer: Arc::new(HttpLoadBalancerClient::new(client.clone())),
            object_storage: Arc::new(HttpObjectStorageClient::new(client.clone())),
            dns: Arc::new(HttpDnsClient::new(client)),
        })
    }
}

/// Non-blank value of a required setting
pub(crate) fn require(value: Option<&str>, env: &str, flag: &str) -> anyhow::Result<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => bail!("missing required setting {env} (or {flag})"),
    }
}
