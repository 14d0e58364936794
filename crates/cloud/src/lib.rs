//! # lbcert-cloud
//!
//! Oracle Cloud control-plane bindings used by certificate rotation.
//!
//! - [`LoadBalancerApi`], [`ObjectStorageApi`], [`DnsApi`]: the interfaces the
//!   rest of the workspace depends on.
//! - [`HttpLoadBalancerClient`], [`HttpObjectStorageClient`], [`HttpDnsClient`]:
//!   implementations over one signed [`OciClient`].
//! - [`mock`]: in-memory fakes with scripted work-request lifecycles.
//! - [`CertificateArchive`]: writes issued key and chain to a private bucket.
//!
//! ```rust,ignore
//! let config = CloudConfig::new("us-ashburn-1", credentials)?;
//! let client = OciClient::new(&config)?;
//! let lb = HttpLoadBalancerClient::new(client.clone());
//! let snapshot = lb.get_load_balancer(&lb_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod archive;
mod client;
mod config;
mod dns;
mod error;
mod loadbalancer;
pub mod mock;
mod model;
mod objectstorage;
mod signer;

pub use api::{DnsApi, LoadBalancerApi, ObjectStorageApi};
pub use archive::{ArchiveLocation, ArchiveObjects, ArchiveReceipt, CertificateArchive, DEFAULT_BUCKET};
pub use client::OciClient;
pub use config::{ApiKeyCredentials, CloudConfig, DEFAULT_REQUEST_TIMEOUT, Endpoints};
pub use dns::HttpDnsClient;
pub use error::{CloudError, CloudResult};
pub use loadbalancer::HttpLoadBalancerClient;
pub use model::{
    Bucket, CertificateSummary, ConnectionConfiguration, Listener, ListenerUpdate, LoadBalancer,
    NewBucket, NewCertificate, PublicAccessType, RecordOperation, RecordOperationKind,
    SslConfiguration, WorkRequest, WorkRequestErrorDetail, WorkRequestId, WorkRequestState,
};
pub use objectstorage::HttpObjectStorageClient;
pub use signer::{RequestSigner, SignedHeaders};
