//! Certificate sources

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::{AcquisitionError, AcquisitionResult};

/// Private key and chain obtained for a set of domains
pub struct IssuedCertificate {
    /// Private key PEM
    pub private_key_pem: SecretString,
    /// Certificate chain PEM, leaf first
    pub certificate_chain_pem: String,
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("private_key_pem", &"[REDACTED]")
            .field("certificates", &self.certificate_count())
            .finish()
    }
}

impl IssuedCertificate {
    /// Number of certificates in the chain
    pub fn certificate_count(&self) -> usize {
        self.certificate_chain_pem
            .matches("-----BEGIN CERTIFICATE-----")
            .count()
    }
}

/// Something that produces certificate material for domains
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Obtain a key and chain covering `domains`
    async fn acquire(&self, domains: &[String]) -> AcquisitionResult<IssuedCertificate>;
}

/// Material issued elsewhere and stored as PEM files
#[derive(Debug, Clone)]
pub struct PemFileSource {
    key_path: PathBuf,
    chain_path: PathBuf,
}

impl PemFileSource {
    /// Source reading `key_path` and `chain_path`
    pub fn new(key_path: impl Into<PathBuf>, chain_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            chain_path: chain_path.into(),
        }
    }
}

#[async_trait]
impl CertificateSource for PemFileSource {
    async fn acquire(&self, _domains: &[String]) -> AcquisitionResult<IssuedCertificate> {
        let key = read(&self.key_path).await?;
        if !key.contains("PRIVATE KEY-----") {
            return Err(AcquisitionError::InvalidPem {
                path: self.key_path.clone(),
                expected: "private key",
            });
        }
        let private_key_pem = SecretString::from(key);

        let certificate_chain_pem = read(&self.chain_path).await?;
        let issued = IssuedCertificate {
            private_key_pem,
            certificate_chain_pem,
        };
        if issued.certificate_count() == 0 {
            return Err(AcquisitionError::InvalidPem {
                path: self.chain_path.clone(),
                expected: "certificate chain",
            });
        }

        tracing::info!(
            key = %self.key_path.display(),
            chain = %self.chain_path.display(),
            certificates = issued.certificate_count(),
            "Loaded certificate from files"
        );
        Ok(issued)
    }
}

async fn read(path: &Path) -> AcquisitionResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AcquisitionError::Io {
            path: path.to_path_buf(),
            source,
        })
}
