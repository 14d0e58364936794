//! Rotation input: target listeners and the new certificate

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};

/// Name of a certificate (and its archived key) derived from issuance time
///
/// Renders as `<prefix>-cert-YYYYMMDD-HHMM` in UTC; the key object is
/// `<prefix>-privatekey-YYYYMMDD-HHMM`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateName {
    prefix: String,
    stamp: String,
}

impl CertificateName {
    /// Prefix used when none is configured
    pub const DEFAULT_PREFIX: &'static str = "lego";

    /// Name for material issued at `at`
    pub fn timestamped(prefix: &str, at: DateTime<Utc>) -> Self {
        Self {
            prefix: prefix.to_owned(),
            stamp: at.format("%Y%m%d-%H%M").to_string(),
        }
    }

    /// Load balancer certificate name
    pub fn certificate(&self) -> String {
        format!("{}-cert-{}", self.prefix, self.stamp)
    }

    /// Object name for the archived private key
    pub fn private_key_object(&self) -> String {
        format!("{}-privatekey-{}", self.prefix, self.stamp)
    }
}

impl fmt::Display for CertificateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-cert-{}", self.prefix, self.stamp)
    }
}

/// New certificate material
#[derive(Debug)]
pub struct CertificateBundle {
    /// Name to register the certificate under
    pub name: String,
    /// Private key PEM
    pub private_key: SecretString,
    /// Full chain PEM, leaf first
    pub certificate_chain: String,
}

impl CertificateBundle {
    /// Bundle from its parts
    pub fn new(
        name: impl Into<String>,
        private_key: SecretString,
        certificate_chain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            private_key,
            certificate_chain: certificate_chain.into(),
        }
    }
}

/// One rotation attempt, immutable once built
#[derive(Debug)]
pub struct RotationRequest {
    load_balancer_id: String,
    listeners: IndexSet<String>,
    certificate: CertificateBundle,
}

impl RotationRequest {
    /// Start building a request
    pub fn builder() -> RotationRequestBuilder {
        RotationRequestBuilder::default()
    }

    /// Load balancer to rotate
    pub fn load_balancer_id(&self) -> &str {
        &self.load_balancer_id
    }

    /// Target listeners in caller order, deduplicated
    pub fn listeners(&self) -> &IndexSet<String> {
        &self.listeners
    }

    /// New certificate material
    pub fn certificate(&self) -> &CertificateBundle {
        &self.certificate
    }
}

/// Builder for [`RotationRequest`]
#[derive(Debug, Default)]
pub struct RotationRequestBuilder {
    load_balancer_id: Option<String>,
    listeners: Vec<String>,
    certificate: Option<CertificateBundle>,
}

impl RotationRequestBuilder {
    /// Load balancer to rotate
    pub fn load_balancer(mut self, id: impl Into<String>) -> Self {
        self.load_balancer_id = Some(id.into());
        self
    }

    /// Add one target listener
    pub fn listener(mut self, name: impl Into<String>) -> Self {
        self.listeners.push(name.into());
        self
    }

    /// Add target listeners in order
    pub fn listeners<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listeners.extend(names.into_iter().map(Into::into));
        self
    }

    /// New certificate material
    pub fn certificate(mut self, bundle: CertificateBundle) -> Self {
        self.certificate = Some(bundle);
        self
    }

    /// Validate and build
    ///
    /// Listener names are trimmed; repeated names collapse onto their first
    /// position.
    pub fn build(self) -> RotationResult<RotationRequest> {
        let load_balancer_id = self
            .load_balancer_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RotationError::configuration("load balancer id is required"))?;

        if self.listeners.is_empty() {
            return Err(RotationError::configuration(
                "at least one target listener is required",
            ));
        }
        let mut listeners = IndexSet::with_capacity(self.listeners.len());
        for (position, name) in self.listeners.into_iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                return Err(RotationError::configuration(format!(
                    "listener name at position {} is blank",
                    position + 1
                )));
            }
            listeners.insert(name.to_owned());
        }

        let certificate = self
            .certificate
            .ok_or_else(|| RotationError::configuration("certificate material is required"))?;
        if certificate.name.trim().is_empty() {
            return Err(RotationError::configuration("certificate name is required"));
        }
        if certificate.private_key.expose_secret().trim().is_empty() {
            return Err(RotationError::configuration("private key is empty"));
        }
        if certificate.certificate_chain.trim().is_empty() {
            return Err(RotationError::configuration("certificate chain is empty"));
        }

        Ok(RotationRequest {
            load_balancer_id,
            listeners,
            certificate,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn bundle() -> CertificateBundle {
        CertificateBundle::new(
            "lego-cert-20240301-0930",
            SecretString::from("KEY".to_string()),
            "CHAIN",
        )
    }

    #[test]
    fn timestamped_names() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 59).unwrap();
        let name = CertificateName::timestamped(CertificateName::DEFAULT_PREFIX, at);
        assert_eq!(name.certificate(), "lego-cert-20240301-0905");
        assert_eq!(name.to_string(), "lego-cert-20240301-0905");
        assert_eq!(name.private_key_object(), "lego-privatekey-20240301-0905");
    }

    #[test]
    fn listeners_keep_first_position_and_collapse_duplicates() {
        let request = RotationRequest::builder()
            .load_balancer(" ocid1.lb ")
            .listeners(["b", " a", "b", "c "])
            .listener("a")
            .certificate(bundle())
            .build()
            .unwrap();

        assert_eq!(request.load_balancer_id(), "ocid1.lb");
        let names: Vec<&str> = request.listeners().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[rstest]
    #[case::no_lb(None, vec!["a"], Some(bundle()), "load balancer")]
    #[case::blank_lb(Some("  "), vec!["a"], Some(bundle()), "load balancer")]
    #[case::no_listeners(Some("lb"), vec![], Some(bundle()), "listener")]
    #[case::blank_listener(Some("lb"), vec!["a", " "], Some(bundle()), "position 2")]
    #[case::no_certificate(Some("lb"), vec!["a"], None, "certificate material")]
    #[case::empty_key(
        Some("lb"),
        vec!["a"],
        Some(CertificateBundle::new("n", SecretString::from(String::new()), "CHAIN")),
        "private key"
    )]
    #[case::empty_chain(
        Some("lb"),
        vec!["a"],
        Some(CertificateBundle::new("n", SecretString::from("KEY".to_string()), "")),
        "chain"
    )]
    #[case::empty_name(
        Some("lb"),
        vec!["a"],
        Some(CertificateBundle::new("", SecretString::from("KEY".to_string()), "CHAIN")),
        "certificate name"
    )]
    fn invalid_requests_are_configuration_errors(
        #[case] lb: Option<&str>,
        #[case] listeners: Vec<&str>,
        #[case] certificate: Option<CertificateBundle>,
        #[case] needle: &str,
    ) {
        let mut builder = RotationRequest::builder().listeners(listeners);
        if let Some(lb) = lb {
            builder = builder.load_balancer(lb);
        }
        if let Some(certificate) = certificate {
            builder = builder.certificate(certificate);
        }

        match builder.build() {
            Err(RotationError::Configuration { reason }) => {
                assert!(reason.contains(needle), "{reason:?} should mention {needle:?}");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn bundle_debug_hides_key() {
        assert!(!format!("{:?}", bundle()).contains("KEY"));
    }
}
