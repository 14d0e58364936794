//! # lbcert-acme
//!
//! Where new certificate material comes from.
//!
//! - [`CertificateSource`]: anything that yields an [`IssuedCertificate`].
//! - [`AcmeIssuer`]: orders a certificate from an ACME CA (Let's Encrypt by
//!   default) and proves domain control with DNS-01 through a [`Dns01Solver`].
//! - [`OciDnsSolver`]: publishes `_acme-challenge` TXT records in an OCI zone.
//! - [`PemFileSource`]: reads material issued elsewhere.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod issuer;
mod key;
mod solver;
mod source;

pub use error::{AcquisitionError, AcquisitionResult};
pub use issuer::{AcmeConfig, AcmeIssuer, LETS_ENCRYPT_PRODUCTION, LETS_ENCRYPT_STAGING};
pub use key::KeyAlgorithm;
pub use solver::{DEFAULT_CHALLENGE_TTL, Dns01Solver, OciDnsSolver, challenge_record_name};
pub use source::{CertificateSource, IssuedCertificate, PemFileSource};
