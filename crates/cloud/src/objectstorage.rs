//! Object storage REST client

use async_trait::async_trait;
use reqwest::Method;

use crate::api::ObjectStorageApi;
use crate::client::{ApiCall, OciClient, endpoint};
use crate::error::CloudResult;
use crate::model::{Bucket, NewBucket};

/// [`ObjectStorageApi`] over the signed REST client
#[derive(Debug, Clone)]
pub struct HttpObjectStorageClient {
    client: OciClient,
}

impl HttpObjectStorageClient {
    /// Wrap a configured client
    pub fn new(client: OciClient) -> Self {
        Self { client }
    }

    fn url(&self, segments: &[&str]) -> CloudResult<url::Url> {
        endpoint(&self.client.endpoints().object_storage, segments)
    }
}

#[async_trait]
impl ObjectStorageApi for HttpObjectStorageClient {
    async fn get_bucket(&self, namespace: &str, bucket: &str) -> CloudResult<Bucket> {
        let url = self.url(&["n", namespace, "b", bucket])?;
        self.client.send_json(&ApiCall::get("get_bucket", url)).await
    }

    async fn create_bucket(&self, namespace: &str, bucket: &NewBucket) -> CloudResult<Bucket> {
        // The collection path keeps its trailing slash.
        let url = self.url(&["n", namespace, "b", ""])?;
        let call = ApiCall::json("create_bucket", Method::POST, url, bucket)?;
        self.client.send_json(&call).await
    }

    async fn put_object(
        &self,
        namespace: &str,
        bucket: &str,
        object: &str,
        body: Vec<u8>,
    ) -> CloudResult<()> {
        let url = self.url(&["n", namespace, "b", bucket, "o", object])?;
        let size = body.len();
        self.client
            .send(&ApiCall::object("put_object", url, body))
            .await?;
        tracing::debug!(namespace, bucket, object, size, "Object stored");
        Ok(())
    }
}
