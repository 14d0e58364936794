//! `lbcert rotate`
//!
//! Acquire a certificate, rotate the load balancer onto it, then archive the
//! key and chain in object storage.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::Args;
use lbcert_acme::{
    AcmeConfig, AcmeIssuer, CertificateSource, KeyAlgorithm, LETS_ENCRYPT_PRODUCTION,
    OciDnsSolver, PemFileSource,
};
use lbcert_cloud::{ArchiveLocation, ArchiveObjects, ArchiveReceipt, CertificateArchive, DEFAULT_BUCKET};
use lbcert_resilience::PollPolicy;
use lbcert_rotation::{
    AbsentCertificate, CertificateBundle, CertificateName, RebindMode, RotationOrchestrator,
    RotationReport, RotationRequest,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::output::OutputFormat;
use crate::settings::{CloudArgs, require};

/// Rotate the certificate served by the load balancer's listeners
#[derive(Args, Debug)]
pub struct RotateArgs {
    #[command(flatten)]
    pub cloud: CloudArgs,

    /// Listeners to rebind, comma-separated
    #[arg(long, env = "OCI_LISTENERS", value_delimiter = ',')]
    pub listeners: Vec<String>,

    /// Domains to certify, comma-separated
    #[arg(long, env = "LETSENCRYPT_DOMAINS", value_delimiter = ',')]
    pub domains: Vec<String>,

    /// ACME account contact address
    #[arg(long, env = "LETSENCRYPT_MY_MAILADDRESS")]
    pub email: Option<String>,

    /// ACME directory URL
    #[arg(long, env = "LETSENCRYPT_CA_URL", default_value = LETS_ENCRYPT_PRODUCTION)]
    pub ca_url: String,

    /// DNS zone (name or OCID) receiving the DNS-01 records
    #[arg(long, env = "OCI_DNS_ZONE")]
    pub dns_zone: Option<String>,

    /// Key type of the issued certificate: rsa2048 or ecdsa_p256
    #[arg(long, value_parser = parse_key_algorithm, default_value = "rsa2048")]
    pub key_algorithm: KeyAlgorithm,

    /// Wait between publishing DNS records and requesting validation
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub propagation_delay: Duration,

    /// Use this certificate chain instead of requesting one
    #[arg(long, requires = "key_file")]
    pub cert_file: Option<PathBuf>,

    /// Private key matching --cert-file
    #[arg(long, requires = "cert_file")]
    pub key_file: Option<PathBuf>,

    /// Prefix of the certificate and archived object names
    #[arg(long, default_value = CertificateName::DEFAULT_PREFIX)]
    pub name_prefix: String,

    /// Archive bucket
    #[arg(long, env = "OCI_OS_BUCKETNAME", default_value = DEFAULT_BUCKET)]
    pub bucket: String,

    /// Object storage namespace
    #[arg(long, env = "OCI_OS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Compartment a missing archive bucket is created in
    #[arg(long, env = "OCI_COMPARTMENT_OCID")]
    pub compartment: Option<String>,

    /// Do not archive the key and chain
    #[arg(long)]
    pub no_archive: bool,

    /// Check that every listener exists before updating any of them
    #[arg(long)]
    pub prevalidate_listeners: bool,

    /// Fail when a superseded certificate is already gone
    #[arg(long)]
    pub strict_reap: bool,

    /// Delete superseded certificates even if a non-target listener still serves them
    #[arg(long)]
    pub no_reference_guard: bool,

    /// Work request polling interval
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub poll_interval: Duration,

    /// Give up on a work request after this long
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll_timeout: Option<Duration>,
}

fn parse_key_algorithm(s: &str) -> Result<KeyAlgorithm, String> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "rsa2048" | "rsa" => Ok(KeyAlgorithm::Rsa2048),
        "ecdsa_p256" | "ecdsa" => Ok(KeyAlgorithm::EcdsaP256),
        _ => Err(format!(
            "invalid key algorithm '{s}', must be 'rsa2048' or 'ecdsa_p256'"
        )),
    }
}

/// Where the certificate comes from
enum Acquisition {
    Files(PemFileSource),
    Acme { zone: String, config: AcmeConfig },
}

#[derive(Debug, Serialize)]
struct RotateOutput {
    #[serde(flatten)]
    report: RotationReport,
    archive: Option<ArchiveReceipt>,
}

impl RotateArgs {
    fn poll_policy(&self) -> PollPolicy {
        let policy = PollPolicy::fixed(self.poll_interval);
        match self.poll_timeout {
            Some(deadline) => policy.with_deadline(deadline),
            None => policy,
        }
    }

    fn listener_names(&self) -> anyhow::Result<Vec<String>> {
        let names: Vec<String> = self
            .listeners
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        if names.is_empty() {
            bail!("missing required setting OCI_LISTENERS (or --listeners)");
        }
        Ok(names)
    }

    fn domain_names(&self) -> Vec<String> {
        self.domains
            .iter()
            .map(|domain| domain.trim())
            .filter(|domain| !domain.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn acquisition(&self) -> anyhow::Result<Acquisition> {
        if let (Some(cert), Some(key)) = (&self.cert_file, &self.key_file) {
            return Ok(Acquisition::Files(PemFileSource::new(key, cert)));
        }
        if self.domain_names().is_empty() {
            bail!("missing required setting LETSENCRYPT_DOMAINS (or --domains)");
        }
        let zone = require(self.dns_zone.as_deref(), "OCI_DNS_ZONE", "--dns-zone")?;
        let config = AcmeConfig {
            directory_url: self.ca_url.clone(),
            contact_email: self.email.clone().filter(|email| !email.trim().is_empty()),
            key_algorithm: self.key_algorithm,
            propagation_delay: self.propagation_delay,
            ..AcmeConfig::default()
        };
        Ok(Acquisition::Acme { zone, config })
    }

    fn archive_location(&self) -> anyhow::Result<Option<ArchiveLocation>> {
        if self.no_archive {
            return Ok(None);
        }
        Ok(Some(ArchiveLocation {
            namespace: require(self.namespace.as_deref(), "OCI_OS_NAMESPACE", "--namespace")?,
            bucket: require(Some(self.bucket.as_str()), "OCI_OS_BUCKETNAME", "--bucket")?,
            compartment_id: require(
                self.compartment.as_deref(),
                "OCI_COMPARTMENT_OCID",
                "--compartment",
            )?,
        }))
    }
}

pub(crate) async fn run(args: RotateArgs, output: OutputFormat) -> anyhow::Result<()> {
    // Everything is validated before the first API call.
    let load_balancer_id = args.cloud.load_balancer_id()?;
    let listeners = args.listener_names()?;
    let acquisition = args.acquisition()?;
    let archive_location = args.archive_location()?;
    let clients = args.cloud.connect()?;

    let orchestrator = RotationOrchestrator::builder(clients.load_balancer.clone())
        .poll_policy(args.poll_policy())
        .rebind_mode(if args.prevalidate_listeners {
            RebindMode::Prevalidate
        } else {
            RebindMode::Interleaved
        })
        .absent_certificate(if args.strict_reap {
            AbsentCertificate::Fail
        } else {
            AbsentCertificate::Skip
        })
        .reference_guard(!args.no_reference_guard)
        .build()
        .context("invalid rotation settings")?;

    let domains = args.domain_names();
    let issued = match acquisition {
        Acquisition::Files(source) => source.acquire(&domains).await,
        Acquisition::Acme { zone, config } => {
            let solver = OciDnsSolver::new(clients.dns.clone(), zone);
            AcmeIssuer::new(config, solver).acquire(&domains).await
        }
    }
    .context("failed to obtain a certificate")?;

    let name = CertificateName::timestamped(&args.name_prefix, Utc::now());
    let archive_objects = ArchiveObjects {
        private_key_name: name.private_key_object(),
        private_key_pem: SecretString::from(issued.private_key_pem.expose_secret().to_owned()),
        certificate_name: name.certificate(),
        certificate_chain_pem: issued.certificate_chain_pem.clone(),
    };

    let request = RotationRequest::builder()
        .load_balancer(load_balancer_id)
        .listeners(listeners)
        .certificate(CertificateBundle::new(
            name.certificate(),
            issued.private_key_pem,
            issued.certificate_chain_pem,
        ))
        .build()
        .context("invalid rotation request")?;

    let report = orchestrator.rotate(request).await.map_err(|failure| {
        if !failure.progress.is_untouched() {
            tracing::warn!(progress = ?failure.progress, "Load balancer was partially modified");
        }
        anyhow::Error::new(failure)
    })?;

    let archive = match archive_location {
        Some(location) => Some(
            CertificateArchive::new(clients.object_storage.clone())
                .store(&location, &archive_objects)
                .await
                .with_context(|| {
                    format!(
                        "certificate {} is live but could not be archived",
                        report.certificate_name
                    )
                })?,
        ),
        None => None,
    };

    let result = RotateOutput { report, archive };
    output.print(&result, || render(&result))
}

fn render(result: &RotateOutput) -> String {
    let mut text = result.report.summary();
    if let Some(receipt) = &result.archive {
        text.push_str(&format!(
            "\n  archived to {}: {}",
            receipt.bucket,
            receipt.objects.join(", ")
        ));
    }
    text
}
