//! DNS REST client

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::api::DnsApi;
use crate::client::{ApiCall, OciClient, endpoint};
use crate::error::CloudResult;
use crate::model::RecordOperation;

#[derive(Serialize)]
struct PatchRecords<'a> {
    items: &'a [RecordOperation],
}

/// [`DnsApi`] over the signed REST client
#[derive(Debug, Clone)]
pub struct HttpDnsClient {
    client: OciClient,
}

impl HttpDnsClient {
    /// Wrap a configured client
    pub fn new(client: OciClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DnsApi for HttpDnsClient {
    async fn patch_records(
        &self,
        zone: &str,
        domain: &str,
        operations: &[RecordOperation],
    ) -> CloudResult<()> {
        let url = endpoint(
            &self.client.endpoints().dns,
            &["zones", zone, "records", domain],
        )?;
        let call = ApiCall::json(
            "patch_domain_records",
            Method::PATCH,
            url,
            &PatchRecords { items: operations },
        )?;
        self.client.send(&call).await?;
        tracing::debug!(zone, domain, count = operations.len(), "DNS records patched");
        Ok(())
    }
}
