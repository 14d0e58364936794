//! Load balancer REST client

use async_trait::async_trait;
use reqwest::Method;

use crate::api::LoadBalancerApi;
use crate::client::{ApiCall, OciClient, endpoint};
use crate::error::CloudResult;
use crate::model::{ListenerUpdate, LoadBalancer, NewCertificate, WorkRequest, WorkRequestId};

/// [`LoadBalancerApi`] over the signed REST client
#[derive(Debug, Clone)]
pub struct HttpLoadBalancerClient {
    client: OciClient,
}

impl HttpLoadBalancerClient {
    /// Wrap a configured client
    pub fn new(client: OciClient) -> Self {
        Self { client }
    }

    fn url(&self, segments: &[&str]) -> CloudResult<url::Url> {
        endpoint(&self.client.endpoints().load_balancer, segments)
    }
}

#[async_trait]
impl LoadBalancerApi for HttpLoadBalancerClient {
    async fn create_certificate(
        &self,
        load_balancer_id: &str,
        certificate: &NewCertificate,
    ) -> CloudResult<WorkRequestId> {
        let url = self.url(&["loadBalancers", load_balancer_id, "certificates"])?;
        let call = ApiCall::json("create_certificate", Method::POST, url, certificate)?;
        let id = self.client.send_for_work_request(&call).await?;
        tracing::debug!(
            load_balancer = load_balancer_id,
            certificate = %certificate.certificate_name,
            work_request = %id,
            "Certificate creation accepted"
        );
        Ok(id)
    }

    async fn get_work_request(&self, id: &WorkRequestId) -> CloudResult<WorkRequest> {
        let url = self.url(&["loadBalancerWorkRequests", id.as_str()])?;
        self.client
            .send_json(&ApiCall::get("get_work_request", url))
            .await
    }

    async fn get_load_balancer(&self, load_balancer_id: &str) -> CloudResult<LoadBalancer> {
        let url = self.url(&["loadBalancers", load_balancer_id])?;
        self.client
            .send_json(&ApiCall::get("get_load_balancer", url))
            .await
    }

    async fn update_listener(
        &self,
        load_balancer_id: &str,
        listener_name: &str,
        update: &ListenerUpdate,
    ) -> CloudResult<WorkRequestId> {
        let url = self.url(&["loadBalancers", load_balancer_id, "listeners", listener_name])?;
        let call = ApiCall::json("update_listener", Method::PUT, url, update)?;
        self.client.send_for_work_request(&call).await
    }

    async fn delete_certificate(
        &self,
        load_balancer_id: &str,
        certificate_name: &str,
    ) -> CloudResult<WorkRequestId> {
        let url = self.url(&["loadBalancers", load_balancer_id, "certificates", certificate_name])?;
        self.client
            .send_for_work_request(&ApiCall::delete("delete_certificate", url))
            .await
    }
}
