//! Signed HTTP transport shared by the service clients

use std::sync::Arc;

use lbcert_resilience::{RetryPolicy, retry_with_backoff};
use reqwest::{Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{CloudConfig, Endpoints};
use crate::error::{CloudError, CloudResult};
use crate::model::WorkRequestId;
use crate::signer::{RequestSigner, SignedHeaders};

const HEADER_OPC_REQUEST_ID: &str = "opc-request-id";
const HEADER_OPC_WORK_REQUEST_ID: &str = "opc-work-request-id";

/// Request body and how it is signed
#[derive(Debug)]
pub(crate) enum Payload {
    /// No body
    Empty,
    /// JSON body; content headers are signed
    Json(Vec<u8>),
    /// Raw object upload; content headers are not signed
    Object(Vec<u8>),
}

/// One API call
#[derive(Debug)]
pub(crate) struct ApiCall {
    pub operation: &'static str,
    pub method: Method,
    pub url: Url,
    pub payload: Payload,
}

impl ApiCall {
    pub fn get(operation: &'static str, url: Url) -> Self {
        Self {
            operation,
            method: Method::GET,
            url,
            payload: Payload::Empty,
        }
    }

    pub fn delete(operation: &'static str, url: Url) -> Self {
        Self {
            operation,
            method: Method::DELETE,
            url,
            payload: Payload::Empty,
        }
    }

    pub fn json<T: serde::Serialize + ?Sized>(
        operation: &'static str,
        method: Method,
        url: Url,
        body: &T,
    ) -> CloudResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| CloudError::Decode {
            operation: operation.to_owned(),
            reason: format!("cannot encode request body: {e}"),
        })?;
        Ok(Self {
            operation,
            method,
            url,
            payload: Payload::Json(bytes),
        })
    }

    pub fn object(operation: &'static str, url: Url, body: Vec<u8>) -> Self {
        Self {
            operation,
            method: Method::PUT,
            url,
            payload: Payload::Object(body),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Signed REST client
///
/// Cheap to clone; the service clients share one instance.
#[derive(Debug, Clone)]
pub struct OciClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    signer: RequestSigner,
    retry: RetryPolicy,
    endpoints: Endpoints,
}

impl OciClient {
    /// Validate `config`, parse the signing key and build the HTTP client
    pub fn new(config: &CloudConfig) -> CloudResult<Self> {
        config.validate()?;
        let signer = RequestSigner::new(&config.credentials)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("lbcert/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CloudError::Transport {
                operation: "build_client".into(),
                source,
            })?;

        tracing::debug!(
            region = %config.region,
            key_id = signer.key_id(),
            load_balancer = %config.endpoints.load_balancer,
            "Cloud client ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                signer,
                retry: config.retry.clone(),
                endpoints: config.endpoints.clone(),
            }),
        })
    }

    /// Service base URLs
    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    /// Send `call`, retrying GETs that fail transiently
    pub(crate) async fn send(&self, call: &ApiCall) -> CloudResult<Response> {
        if call.method == Method::GET {
            retry_with_backoff(
                &self.inner.retry,
                call.operation,
                CloudError::is_retryable,
                || self.send_once(call),
            )
            .await
        } else {
            self.send_once(call).await
        }
    }

    /// Send `call` and decode a JSON response
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, call: &ApiCall) -> CloudResult<T> {
        let response = self.send(call).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CloudError::Decode {
                operation: call.operation.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Send `call` and read the work request it started
    pub(crate) async fn send_for_work_request(&self, call: &ApiCall) -> CloudResult<WorkRequestId> {
        let response = self.send(call).await?;
        work_request_id(&response, call.operation)
    }

    async fn send_once(&self, call: &ApiCall) -> CloudResult<Response> {
        let mut builder = self.inner.http.request(call.method.clone(), call.url.clone());
        let headers = match &call.payload {
            Payload::Empty => SignedHeaders::Basic,
            Payload::Json(bytes) => {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
                SignedHeaders::WithBody
            }
            Payload::Object(bytes) => {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone());
                SignedHeaders::Basic
            }
        };
        let mut request = builder.build().map_err(|source| CloudError::Transport {
            operation: call.operation.to_owned(),
            source,
        })?;
        self.inner.signer.sign(&mut request, headers)?;

        tracing::debug!(
            operation = call.operation,
            method = %call.method,
            url = %call.url,
            "Sending cloud request"
        );

        let response = self
            .inner
            .http
            .execute(request)
            .await
            .map_err(|source| CloudError::Transport {
                operation: call.operation.to_owned(),
                source,
            })?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(status_error(call.operation, response).await)
    }
}

async fn status_error(operation: &str, response: Response) -> CloudError {
    let status = response.status();
    let opc_request_id = response
        .headers()
        .get(HEADER_OPC_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ServiceError>(&body) {
        Ok(err) => (err.code, err.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("Unknown").to_owned(),
            body,
        ),
    };

    tracing::debug!(operation, status = status.as_u16(), %code, "Cloud request rejected");

    CloudError::Status {
        operation: operation.to_owned(),
        status: status.as_u16(),
        code,
        message,
        opc_request_id,
    }
}

fn work_request_id(response: &Response, operation: &str) -> CloudResult<WorkRequestId> {
    response
        .headers()
        .get(HEADER_OPC_WORK_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(WorkRequestId::from)
        .ok_or_else(|| CloudError::MissingHeader {
            operation: operation.to_owned(),
            header: HEADER_OPC_WORK_REQUEST_ID,
        })
}

/// `base` with `segments` appended, each percent-encoded
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> CloudResult<Url> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|()| CloudError::Config {
            field: "endpoint",
            reason: format!("{base} cannot be used as a base URL"),
        })?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let base = Url::parse("https://iaas.us-ashburn-1.oraclecloud.com/20170115/").unwrap();
        let url = endpoint(&base, &["loadBalancers", "ocid1.lb..x", "listeners", "my listener"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://iaas.us-ashburn-1.oraclecloud.com/20170115/loadBalancers/ocid1.lb..x/listeners/my%20listener"
        );
    }

    #[test]
    fn endpoint_with_trailing_empty_segment() {
        let base = Url::parse("http://127.0.0.1:9000/").unwrap();
        let url = endpoint(&base, &["n", "ns", "b", ""]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/n/ns/b/");
    }
}
