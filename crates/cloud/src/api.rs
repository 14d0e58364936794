//! Control-plane interfaces
//!
//! Rotation, archiving and DNS-01 solving depend on these traits only; the
//! HTTP clients and the in-memory fakes in [`mock`](crate::mock) implement them.

use async_trait::async_trait;

use crate::error::CloudResult;
use crate::model::{
    Bucket, ListenerUpdate, LoadBalancer, NewBucket, NewCertificate, RecordOperation, WorkRequest,
    WorkRequestId,
};

/// Load balancer control API
///
/// Every mutation is asynchronous on the service side and returns the id of
/// the work request that tracks it.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    /// Register a certificate under `certificate.certificate_name`
    async fn create_certificate(
        &self,
        load_balancer_id: &str,
        certificate: &NewCertificate,
    ) -> CloudResult<WorkRequestId>;

    /// Current snapshot of a work request
    async fn get_work_request(&self, id: &WorkRequestId) -> CloudResult<WorkRequest>;

    /// Load balancer with its full listener and certificate maps
    async fn get_load_balancer(&self, load_balancer_id: &str) -> CloudResult<LoadBalancer>;

    /// Replace a listener's definition
    async fn update_listener(
        &self,
        load_balancer_id: &str,
        listener_name: &str,
        update: &ListenerUpdate,
    ) -> CloudResult<WorkRequestId>;

    /// Remove a certificate
    async fn delete_certificate(
        &self,
        load_balancer_id: &str,
        certificate_name: &str,
    ) -> CloudResult<WorkRequestId>;
}

/// Object storage API, restricted to what archiving needs
#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    /// Bucket metadata; a missing bucket is a not-found status error
    async fn get_bucket(&self, namespace: &str, bucket: &str) -> CloudResult<Bucket>;

    /// Create a bucket
    async fn create_bucket(&self, namespace: &str, bucket: &NewBucket) -> CloudResult<Bucket>;

    /// Upload (or overwrite) an object
    async fn put_object(
        &self,
        namespace: &str,
        bucket: &str,
        object: &str,
        body: Vec<u8>,
    ) -> CloudResult<()>;
}

/// DNS zone record API
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Apply `operations` to the records of `domain` in `zone`
    async fn patch_records(
        &self,
        zone: &str,
        domain: &str,
        operations: &[RecordOperation],
    ) -> CloudResult<()>;
}
