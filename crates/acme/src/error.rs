//! Acquisition error types

use std::path::PathBuf;
use std::time::Duration;

use lbcert_cloud::CloudError;
use thiserror::Error;

/// Errors raised while obtaining certificate material
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Nothing to issue for
    #[error("At least one domain is required")]
    NoDomains,

    /// A PEM file could not be read
    #[error("Failed to read {}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// A PEM file does not hold what it should
    #[error("{} is not a valid {expected}", path.display())]
    InvalidPem {
        /// Offending file
        path: PathBuf,
        /// Expected content, e.g. "private key"
        expected: &'static str,
    },

    /// The ACME server rejected or failed a request
    #[error("ACME {stage} failed")]
    Acme {
        /// Protocol step
        stage: &'static str,
        /// Underlying failure
        #[source]
        source: instant_acme::Error,
    },

    /// An authorization offered no DNS-01 challenge
    #[error("No DNS-01 challenge offered for {domain}")]
    NoDnsChallenge {
        /// Identifier being authorized
        domain: String,
    },

    /// The order became invalid
    #[error("ACME order is invalid: {reason}")]
    OrderInvalid {
        /// Server-provided problem, when any
        reason: String,
    },

    /// The order did not become ready in time
    #[error("ACME order still {status} after {elapsed:?}")]
    OrderTimedOut {
        /// Last observed status
        status: String,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// Publishing or removing a challenge record failed
    #[error("DNS challenge record for {domain} could not be updated")]
    Dns {
        /// Domain being validated
        domain: String,
        /// Underlying failure
        #[source]
        source: CloudError,
    },

    /// Key or CSR generation failed
    #[error("Key material generation failed: {0}")]
    KeyGeneration(String),
}

impl AcquisitionError {
    /// Wrap an ACME protocol failure
    pub fn acme(stage: &'static str, source: instant_acme::Error) -> Self {
        Self::Acme { stage, source }
    }
}

impl From<rcgen::Error> for AcquisitionError {
    fn from(err: rcgen::Error) -> Self {
        Self::KeyGeneration(err.to_string())
    }
}

/// Result type for acquisition
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;
