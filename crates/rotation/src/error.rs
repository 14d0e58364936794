//! Rotation error types

use std::time::Duration;

use lbcert_cloud::{CloudError, WorkRequestId};
use thiserror::Error;

use crate::report::RotationProgress;
use crate::state::RotationState;

/// Errors that can end a rotation
#[derive(Debug, Error)]
pub enum RotationError {
    /// Missing or malformed input; raised before any cloud mutation
    #[error("Invalid rotation request: {reason}")]
    Configuration {
        /// What is wrong
        reason: String,
    },

    /// A target listener does not exist on the load balancer
    ///
    /// Listeners named in `already_submitted` were repointed before the
    /// missing one was reached and are not reverted.
    #[error("Listener {listener} not found on load balancer {load_balancer}")]
    ListenerNotFound {
        /// Missing listener
        listener: String,
        /// Load balancer searched
        load_balancer: String,
        /// Listeners whose update had already been submitted
        already_submitted: Vec<String>,
    },

    /// A work request reached `FAILED`
    #[error("Work request {work_request} failed: {message}")]
    OperationFailed {
        /// Failed work request
        work_request: WorkRequestId,
        /// Service-provided reason
        message: String,
    },

    /// The poll deadline elapsed while a work request was still pending
    #[error("Work request {work_request} still pending after {elapsed:?}")]
    WaitTimedOut {
        /// Pending work request
        work_request: WorkRequestId,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// A control-plane call failed; no work request was created by it
    #[error("Cloud call {operation} failed")]
    Cloud {
        /// Operation attempted
        operation: &'static str,
        /// Underlying failure
        #[source]
        source: CloudError,
    },

    /// The orchestrator attempted an edge its state machine does not have
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state
        from: RotationState,
        /// Requested state
        to: RotationState,
    },
}

impl RotationError {
    /// Wrap a failed control-plane call
    pub fn cloud(operation: &'static str, source: CloudError) -> Self {
        Self::Cloud { operation, source }
    }

    /// Wrap a validation message
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// Result type for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;

/// A rotation that stopped before `Done`
///
/// Nothing is rolled back; `progress` tells what is already in effect on the
/// load balancer.
#[derive(Debug, Error)]
#[error("Rotation failed while {phase}: {error}")]
pub struct RotationFailure {
    /// State the rotation was in when the error occurred
    pub phase: RotationState,
    /// What went wrong
    #[source]
    pub error: RotationError,
    /// Mutations that were submitted or completed before the failure
    pub progress: RotationProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_the_phase() {
        let failure = RotationFailure {
            phase: RotationState::AwaitingRebind,
            error: RotationError::OperationFailed {
                work_request: WorkRequestId::new("wr-b"),
                message: "backend set missing".into(),
            },
            progress: RotationProgress::default(),
        };
        assert_eq!(
            failure.to_string(),
            "Rotation failed while awaiting_rebind: Work request wr-b failed: backend set missing"
        );
    }

    #[test]
    fn cloud_error_is_the_source() {
        use std::error::Error as _;

        let err = RotationError::cloud(
            "update_listener",
            CloudError::status("update_listener", 503, "ServiceUnavailable", "busy"),
        );
        assert_eq!(err.to_string(), "Cloud call update_listener failed");
        assert!(err.source().is_some());
    }
}
