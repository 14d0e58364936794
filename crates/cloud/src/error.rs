//! Cloud API error types

/// Result type for cloud calls
pub type CloudResult<T> = Result<T, CloudError>;

/// Failure of a single cloud API call
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// The request never produced an HTTP response
    #[error("{operation}: transport failure: {source}")]
    Transport {
        /// API operation name
        operation: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error(
        "{operation}: HTTP {status} {code}: {message} (opc-request-id: {})",
        .opc_request_id.as_deref().unwrap_or("-")
    )]
    Status {
        /// API operation name
        operation: String,
        /// HTTP status code
        status: u16,
        /// Service error code, e.g. `NotAuthorizedOrNotFound`
        code: String,
        /// Service error message
        message: String,
        /// Correlation id to quote in support requests
        opc_request_id: Option<String>,
    },

    /// The response body did not have the expected shape
    #[error("{operation}: cannot decode response: {reason}")]
    Decode {
        /// API operation name
        operation: String,
        /// Decoder message
        reason: String,
    },

    /// A header the operation depends on was absent
    #[error("{operation}: response is missing the {header} header")]
    MissingHeader {
        /// API operation name
        operation: String,
        /// Header name
        header: &'static str,
    },

    /// The request could not be signed
    #[error("request signing failed: {0}")]
    Signing(String),

    /// Client configuration is unusable
    #[error("invalid cloud configuration: {field}: {reason}")]
    Config {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl CloudError {
    /// Status error with the service's not-found code
    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            operation: operation.into(),
            status: 404,
            code: "NotAuthorizedOrNotFound".into(),
            message: message.into(),
            opc_request_id: None,
        }
    }

    /// Status error from a fake or a decoded service response
    pub fn status(
        operation: impl Into<String>,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Status {
            operation: operation.into(),
            status,
            code: code.into(),
            message: message.into(),
            opc_request_id: None,
        }
    }

    /// HTTP status, when the service answered
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }

    /// Worth repeating an idempotent call
    ///
    /// Connection failures, timeouts, throttling and server errors qualify;
    /// client errors and local failures do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. }
            | Self::MissingHeader { .. }
            | Self::Signing(_)
            | Self::Config { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(404, false, true)]
    #[case(409, false, false)]
    #[case(429, true, false)]
    #[case(500, true, false)]
    #[case(503, true, false)]
    fn status_classification(#[case] status: u16, #[case] retryable: bool, #[case] missing: bool) {
        let err = CloudError::status("get_load_balancer", status, "Code", "message");
        assert_eq!(err.is_retryable(), retryable);
        assert_eq!(err.is_not_found(), missing);
    }

    #[test]
    fn display_includes_request_id_placeholder() {
        let err = CloudError::not_found("get_load_balancer", "no such load balancer");
        assert_eq!(
            err.to_string(),
            "get_load_balancer: HTTP 404 NotAuthorizedOrNotFound: no such load balancer (opc-request-id: -)"
        );
    }

    #[test]
    fn local_failures_are_not_retryable() {
        assert!(!CloudError::Signing("bad key".into()).is_retryable());
        assert!(
            !CloudError::MissingHeader {
                operation: "create_certificate".into(),
                header: "opc-work-request-id",
            }
            .is_retryable()
        );
    }
}
