//! Wire types for the load balancer, object storage and DNS APIs
//!
//! Field names follow the service's camelCase JSON. Listener and SSL
//! configuration keep attributes this crate does not model in a flattened
//! map so that a read-modify-write rebind does not drop them.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Opaque handle of an asynchronous load balancer operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkRequestId(String);

impl WorkRequestId {
    /// Wrap a service-issued id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkRequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkRequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a work request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestState {
    /// Queued by the service
    Accepted,
    /// Being applied
    InProgress,
    /// Applied
    Succeeded,
    /// Rejected or rolled back
    Failed,
}

impl WorkRequestState {
    /// `Succeeded` or `Failed`; a terminal state never changes again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for WorkRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        })
    }
}

/// Error entry attached to a failed work request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequestErrorDetail {
    /// Service error code
    #[serde(default)]
    pub error_code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Snapshot of a work request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    /// Work request id
    pub id: WorkRequestId,
    /// Current state
    #[serde(rename = "lifecycleState")]
    pub state: WorkRequestState,
    /// Load balancer the operation targets
    #[serde(default)]
    pub load_balancer_id: Option<String>,
    /// Operation kind as reported by the service
    #[serde(default, rename = "type")]
    pub operation_type: Option<String>,
    /// Latest progress or failure message
    #[serde(default)]
    pub message: Option<String>,
    /// Errors reported for a failed operation
    #[serde(default)]
    pub error_details: Vec<WorkRequestErrorDetail>,
}

impl WorkRequest {
    /// Best available failure description
    pub fn failure_message(&self) -> String {
        let details: Vec<&str> = self
            .error_details
            .iter()
            .filter_map(|d| d.message.as_deref())
            .collect();
        if !details.is_empty() {
            return details.join("; ");
        }
        self.message
            .clone()
            .unwrap_or_else(|| format!("work request {} failed", self.id))
    }
}

/// TLS termination settings of a listener
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslConfiguration {
    /// Certificate served by the listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,
    /// Require client certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_peer_certificate: Option<bool>,
    /// Client chain depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_depth: Option<u32>,
    /// Protocols, cipher suite and other settings passed through unchanged
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Idle timeout and proxy protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfiguration {
    /// Seconds before an idle connection is closed
    pub idle_timeout: i64,
    /// Proxy protocol version, when enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_tcp_proxy_protocol_version: Option<u8>,
}

/// Listener as reported by the load balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Listener name, unique within its load balancer
    pub name: String,
    /// Backend set traffic is routed to
    pub default_backend_set_name: String,
    /// Listening port
    pub port: u16,
    /// `HTTP`, `HTTP2` or `TCP`
    pub protocol: String,
    /// TLS settings, absent for plain listeners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_configuration: Option<SslConfiguration>,
    /// Virtual host names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostname_names: Vec<String>,
    /// Path route set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_route_set_name: Option<String>,
    /// Routing policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_policy_name: Option<String>,
    /// Rule sets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_set_names: Vec<String>,
    /// Connection settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_configuration: Option<ConnectionConfiguration>,
}

impl Listener {
    /// Certificate currently bound, if any
    pub fn certificate_name(&self) -> Option<&str> {
        self.ssl_configuration
            .as_ref()
            .and_then(|ssl| ssl.certificate_name.as_deref())
    }
}

/// Certificate stored on a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Certificate name, unique within its load balancer
    pub certificate_name: String,
    /// Leaf certificate PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_certificate: Option<String>,
    /// Intermediate chain PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
}

/// Load balancer snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    /// Load balancer OCID
    pub id: String,
    /// Display name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Listeners keyed by name
    #[serde(default)]
    pub listeners: BTreeMap<String, Listener>,
    /// Certificates keyed by name
    #[serde(default)]
    pub certificates: BTreeMap<String, CertificateSummary>,
}

impl LoadBalancer {
    /// Look up a listener by name
    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.listeners
            .get(name)
            .or_else(|| self.listeners.values().find(|l| l.name == name))
    }

    /// Whether any listener currently serves `certificate_name`
    pub fn is_certificate_bound(&self, certificate_name: &str) -> bool {
        self.listeners
            .values()
            .any(|l| l.certificate_name() == Some(certificate_name))
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::ref_option)]
fn expose_opt<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Body of a create-certificate call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    /// Name to register the certificate under
    pub certificate_name: String,
    /// Private key PEM
    #[serde(serialize_with = "expose")]
    pub private_key: SecretString,
    /// Full chain PEM, leaf first
    pub public_certificate: String,
    /// Passphrase of an encrypted private key
    #[serde(serialize_with = "expose_opt", skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<SecretString>,
}

/// Body of an update-listener call
///
/// The service replaces the whole listener definition, so every attribute is
/// carried over from the current listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerUpdate {
    /// Backend set traffic is routed to
    pub default_backend_set_name: String,
    /// Listening port
    pub port: u16,
    /// Listener protocol
    pub protocol: String,
    /// TLS settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_configuration: Option<SslConfiguration>,
    /// Virtual host names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostname_names: Vec<String>,
    /// Path route set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_route_set_name: Option<String>,
    /// Routing policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_policy_name: Option<String>,
    /// Rule sets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_set_names: Vec<String>,
    /// Connection settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_configuration: Option<ConnectionConfiguration>,
}

impl ListenerUpdate {
    /// Carry `listener` over unchanged
    pub fn from_listener(listener: &Listener) -> Self {
        Self {
            default_backend_set_name: listener.default_backend_set_name.clone(),
            port: listener.port,
            protocol: listener.protocol.clone(),
            ssl_configuration: listener.ssl_configuration.clone(),
            hostname_names: listener.hostname_names.clone(),
            path_route_set_name: listener.path_route_set_name.clone(),
            routing_policy_name: listener.routing_policy_name.clone(),
            rule_set_names: listener.rule_set_names.clone(),
            connection_configuration: listener.connection_configuration.clone(),
        }
    }

    /// Serve `certificate_name`, keeping every other TLS setting
    pub fn with_certificate(mut self, certificate_name: impl Into<String>) -> Self {
        let ssl = self.ssl_configuration.get_or_insert_with(|| SslConfiguration {
            verify_peer_certificate: Some(false),
            verify_depth: Some(1),
            ..SslConfiguration::default()
        });
        ssl.certificate_name = Some(certificate_name.into());
        self
    }

    /// Certificate this update binds
    pub fn certificate_name(&self) -> Option<&str> {
        self.ssl_configuration
            .as_ref()
            .and_then(|ssl| ssl.certificate_name.as_deref())
    }

    /// Apply this update to an existing listener definition
    pub fn apply_to(&self, listener: &mut Listener) {
        listener.default_backend_set_name.clone_from(&self.default_backend_set_name);
        listener.port = self.port;
        listener.protocol.clone_from(&self.protocol);
        listener.ssl_configuration.clone_from(&self.ssl_configuration);
        listener.hostname_names.clone_from(&self.hostname_names);
        listener.path_route_set_name.clone_from(&self.path_route_set_name);
        listener.routing_policy_name.clone_from(&self.routing_policy_name);
        listener.rule_set_names.clone_from(&self.rule_set_names);
        listener
            .connection_configuration
            .clone_from(&self.connection_configuration);
    }
}

/// Object storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket name
    pub name: String,
    /// Object storage namespace
    #[serde(default)]
    pub namespace: String,
    /// Owning compartment
    #[serde(default)]
    pub compartment_id: String,
    /// Public visibility
    #[serde(default)]
    pub public_access_type: PublicAccessType,
}

/// Bucket visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicAccessType {
    /// Private (the only kind this tool creates)
    #[default]
    NoPublicAccess,
    /// Anyone may read objects
    ObjectRead,
    /// Anyone may read objects, listing disabled
    ObjectReadWithoutList,
}

/// Body of a create-bucket call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBucket {
    /// Bucket name
    pub name: String,
    /// Owning compartment
    pub compartment_id: String,
    /// Visibility
    pub public_access_type: PublicAccessType,
}

impl NewBucket {
    /// Private bucket in `compartment_id`
    pub fn private(name: impl Into<String>, compartment_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compartment_id: compartment_id.into(),
            public_access_type: PublicAccessType::NoPublicAccess,
        }
    }
}

/// Direction of a DNS record patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordOperationKind {
    /// Add the record
    Add,
    /// Remove the record
    Remove,
}

/// One record change in a zone patch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOperation {
    /// Fully qualified record name
    pub domain: String,
    /// Record type, e.g. `TXT`
    pub rtype: String,
    /// Record data
    pub rdata: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// Add or remove
    pub operation: RecordOperationKind,
}

impl RecordOperation {
    /// TXT record change
    pub fn txt(
        operation: RecordOperationKind,
        domain: impl Into<String>,
        value: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            domain: domain.into(),
            rtype: "TXT".into(),
            rdata: value.into(),
            ttl,
            operation,
        }
    }
}
