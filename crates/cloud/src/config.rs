//! Client configuration: region, API-key credentials and service endpoints

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use lbcert_resilience::RetryPolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CloudError, CloudResult};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// API-key identity used to sign requests
pub struct ApiKeyCredentials {
    /// Tenancy OCID
    pub tenancy_id: String,
    /// User OCID
    pub user_id: String,
    /// Fingerprint of the uploaded public key
    pub fingerprint: String,
    /// PEM-encoded private key (PKCS#8, encrypted PKCS#8 or PKCS#1)
    pub private_key_pem: SecretString,
    /// Passphrase for an encrypted private key
    pub passphrase: Option<SecretString>,
}

impl fmt::Debug for ApiKeyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyCredentials")
            .field("tenancy_id", &self.tenancy_id)
            .field("user_id", &self.user_id)
            .field("fingerprint", &self.fingerprint)
            .field("private_key_pem", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ApiKeyCredentials {
    /// Credentials whose key arrives base64-encoded (as it does from the environment)
    pub fn from_base64_key(
        tenancy_id: impl Into<String>,
        user_id: impl Into<String>,
        fingerprint: impl Into<String>,
        private_key_base64: &str,
        passphrase: Option<SecretString>,
    ) -> CloudResult<Self> {
        let compact: String = private_key_base64
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD.decode(compact).map_err(|e| CloudError::Config {
            field: "private_key",
            reason: format!("not valid base64: {e}"),
        })?;
        let pem = String::from_utf8(bytes).map_err(|_| CloudError::Config {
            field: "private_key",
            reason: "decoded key is not UTF-8 PEM text".into(),
        })?;

        Ok(Self {
            tenancy_id: tenancy_id.into(),
            user_id: user_id.into(),
            fingerprint: fingerprint.into(),
            private_key_pem: SecretString::from(pem),
            passphrase: passphrase.filter(|p| !p.expose_secret().is_empty()),
        })
    }

    /// `keyId` of the signature header: `tenancy/user/fingerprint`
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy_id, self.user_id, self.fingerprint)
    }

    /// Check that every identity field is present
    pub fn validate(&self) -> CloudResult<()> {
        for (field, value) in [
            ("tenancy_id", &self.tenancy_id),
            ("user_id", &self.user_id),
            ("fingerprint", &self.fingerprint),
        ] {
            if value.trim().is_empty() {
                return Err(CloudError::Config {
                    field,
                    reason: "must not be empty".into(),
                });
            }
        }
        if !self.private_key_pem.expose_secret().contains("-----BEGIN") {
            return Err(CloudError::Config {
                field: "private_key",
                reason: "expected a PEM-encoded key".into(),
            });
        }
        Ok(())
    }
}

/// Base URLs of the three services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Load balancer API, including the version segment
    pub load_balancer: Url,
    /// Object storage API
    pub object_storage: Url,
    /// DNS API, including the version segment
    pub dns: Url,
}

impl Endpoints {
    /// Public endpoints of `region`
    pub fn for_region(region: &str) -> CloudResult<Self> {
        let region = region.trim();
        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(CloudError::Config {
                field: "region",
                reason: format!("invalid region identifier {region:?}"),
            });
        }
        Ok(Self {
            load_balancer: parse_base(&format!(
                "https://iaas.{region}.oraclecloud.com/20170115/"
            ))?,
            object_storage: parse_base(&format!("https://objectstorage.{region}.oraclecloud.com/"))?,
            dns: parse_base(&format!("https://dns.{region}.oraclecloud.com/20180115/"))?,
        })
    }

    /// All three services behind one base URL (local fakes)
    pub fn single(base: &str) -> CloudResult<Self> {
        let base = base.trim_end_matches('/');
        Ok(Self {
            load_balancer: parse_base(&format!("{base}/20170115/"))?,
            object_storage: parse_base(&format!("{base}/"))?,
            dns: parse_base(&format!("{base}/20180115/"))?,
        })
    }
}

fn parse_base(raw: &str) -> CloudResult<Url> {
    let url = Url::parse(raw).map_err(|e| CloudError::Config {
        field: "endpoint",
        reason: format!("{raw}: {e}"),
    })?;
    if url.cannot_be_a_base() {
        return Err(CloudError::Config {
            field: "endpoint",
            reason: format!("{raw} cannot be used as a base URL"),
        });
    }
    Ok(url)
}

/// Everything needed to build an [`OciClient`](crate::OciClient)
#[derive(Debug)]
pub struct CloudConfig {
    /// Region identifier, e.g. `us-ashburn-1`
    pub region: String,
    /// Signing identity
    pub credentials: ApiKeyCredentials,
    /// Service base URLs
    pub endpoints: Endpoints,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for idempotent reads
    pub retry: RetryPolicy,
}

impl CloudConfig {
    /// Public endpoints of `region`, default timeout and retry policy
    pub fn new(region: impl Into<String>, credentials: ApiKeyCredentials) -> CloudResult<Self> {
        let region = region.into();
        let endpoints = Endpoints::for_region(&region)?;
        Ok(Self {
            region,
            credentials,
            endpoints,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the service URLs
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the read retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate credentials and limits
    pub fn validate(&self) -> CloudResult<()> {
        self.credentials.validate()?;
        if self.timeout.is_zero() {
            return Err(CloudError::Config {
                field: "timeout",
                reason: "must be greater than zero".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(CloudError::Config {
                field: "retry.max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
