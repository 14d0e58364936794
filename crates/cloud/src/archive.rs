//! Durable copy of issued certificates in object storage

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::api::ObjectStorageApi;
use crate::error::CloudResult;
use crate::model::NewBucket;

/// Bucket name used when none is configured
pub const DEFAULT_BUCKET: &str = "lego-cert";

/// Where archived objects go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    /// Object storage namespace
    pub namespace: String,
    /// Bucket name
    pub bucket: String,
    /// Compartment a missing bucket is created in
    pub compartment_id: String,
}

/// The two objects written per issued certificate
#[derive(Debug)]
pub struct ArchiveObjects {
    /// Object name of the private key
    pub private_key_name: String,
    /// Private key PEM
    pub private_key_pem: SecretString,
    /// Object name of the certificate chain
    pub certificate_name: String,
    /// Certificate chain PEM
    pub certificate_chain_pem: String,
}

/// What [`CertificateArchive::store`] did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReceipt {
    /// Bucket the objects were written to
    pub bucket: String,
    /// The bucket did not exist and was created
    pub bucket_created: bool,
    /// Object names, key first
    pub objects: Vec<String>,
}

/// Writes key and chain to a private bucket, creating it on first use
#[derive(Clone)]
pub struct CertificateArchive {
    storage: Arc<dyn ObjectStorageApi>,
}

impl std::fmt::Debug for CertificateArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateArchive").finish_non_exhaustive()
    }
}

impl CertificateArchive {
    /// Archive backed by `storage`
    pub fn new(storage: Arc<dyn ObjectStorageApi>) -> Self {
        Self { storage }
    }

    /// Make sure the bucket exists; `true` when it had to be created
    pub async fn ensure_bucket(&self, location: &ArchiveLocation) -> CloudResult<bool> {
        match self
            .storage
            .get_bucket(&location.namespace, &location.bucket)
            .await
        {
            Ok(_) => Ok(false),
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    namespace = %location.namespace,
                    bucket = %location.bucket,
                    "Archive bucket missing, creating it"
                );
                let request = NewBucket::private(&location.bucket, &location.compartment_id);
                match self.storage.create_bucket(&location.namespace, &request).await {
                    Ok(_) => Ok(true),
                    // Created concurrently by someone else.
                    Err(err) if err.http_status() == Some(409) => Ok(false),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Ensure the bucket, then upload the private key and the chain
    pub async fn store(
        &self,
        location: &ArchiveLocation,
        objects: &ArchiveObjects,
    ) -> CloudResult<ArchiveReceipt> {
        let bucket_created = self.ensure_bucket(location).await?;

        self.storage
            .put_object(
                &location.namespace,
                &location.bucket,
                &objects.private_key_name,
                objects.private_key_pem.expose_secret().as_bytes().to_vec(),
            )
            .await?;
        self.storage
            .put_object(
                &location.namespace,
                &location.bucket,
                &objects.certificate_name,
                objects.certificate_chain_pem.as_bytes().to_vec(),
            )
            .await?;

        tracing::info!(
            bucket = %location.bucket,
            private_key = %objects.private_key_name,
            certificate = %objects.certificate_name,
            "Certificate archived"
        );

        Ok(ArchiveReceipt {
            bucket: location.bucket.clone(),
            bucket_created,
            objects: vec![
                objects.private_key_name.clone(),
                objects.certificate_name.clone(),
            ],
        })
    }
}
