//! Rotation Events
//!
//! Every state transition and every submitted or awaited work request is
//! reported to a [`RotationObserver`]. Components never log progress through
//! a global; they are handed an observer.

use lbcert_cloud::{WorkRequestId, WorkRequestState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::state::RotationState;

/// Kind of mutation a work request tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    /// Certificate registration
    CreateCertificate,
    /// Listener repoint
    UpdateListener,
    /// Certificate removal
    DeleteCertificate,
}

impl std::fmt::Display for WorkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CreateCertificate => "create_certificate",
            Self::UpdateListener => "update_listener",
            Self::DeleteCertificate => "delete_certificate",
        })
    }
}

/// Event emitted during a rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RotationEvent {
    /// The orchestrator moved to another state
    StateChanged {
        /// Previous state
        from: RotationState,
        /// New state
        to: RotationState,
    },

    /// A mutation was accepted by the service
    WorkRequestSubmitted {
        /// Mutation kind
        kind: WorkKind,
        /// Certificate or listener name
        target: String,
        /// Tracking handle
        work_request: WorkRequestId,
    },

    /// A work request reached a terminal state
    WorkRequestCompleted {
        /// Mutation kind
        kind: WorkKind,
        /// Certificate or listener name
        target: String,
        /// Tracking handle
        work_request: WorkRequestId,
        /// `Succeeded` or `Failed`
        state: WorkRequestState,
    },

    /// A superseded certificate is still served and will not be deleted
    CertificateRetained {
        /// Certificate name
        certificate: String,
        /// Listeners still serving it
        listeners: Vec<String>,
    },

    /// A superseded certificate was already gone when its delete was sent
    CertificateAlreadyAbsent {
        /// Certificate name
        certificate: String,
    },
}

/// Receives rotation events
pub trait RotationObserver: Send + Sync {
    /// Handle one event; must not block
    fn notify(&self, event: &RotationEvent);
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RotationObserver for TracingObserver {
    fn notify(&self, event: &RotationEvent) {
        match event {
            RotationEvent::StateChanged { from, to } => {
                if *to == RotationState::Failed {
                    tracing::warn!(%from, %to, "Rotation state changed");
                } else {
                    tracing::info!(%from, %to, "Rotation state changed");
                }
            }
            RotationEvent::WorkRequestSubmitted {
                kind,
                target,
                work_request,
            } => {
                tracing::info!(%kind, subject = %target, %work_request, "Work request submitted");
            }
            RotationEvent::WorkRequestCompleted {
                kind,
                target,
                work_request,
                state,
            } => {
                if *state == WorkRequestState::Succeeded {
                    tracing::info!(%kind, subject = %target, %work_request, %state, "Work request completed");
                } else {
                    tracing::warn!(%kind, subject = %target, %work_request, %state, "Work request completed");
                }
            }
            RotationEvent::CertificateRetained {
                certificate,
                listeners,
            } => {
                tracing::warn!(
                    %certificate,
                    listeners = ?listeners,
                    "Superseded certificate still in use, not deleting"
                );
            }
            RotationEvent::CertificateAlreadyAbsent { certificate } => {
                tracing::warn!(%certificate, "Superseded certificate already absent");
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RotationEvent>>,
}

impl RecordingObserver {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in order
    pub fn events(&self) -> Vec<RotationEvent> {
        self.events.lock().clone()
    }

    /// Sequence of states entered, in order
    pub fn states(&self) -> Vec<RotationState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RotationEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Targets of submitted work requests of `kind`, in order
    pub fn submitted(&self, kind: WorkKind) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RotationEvent::WorkRequestSubmitted { kind: k, target, .. } if *k == kind => {
                    Some(target.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl RotationObserver for RecordingObserver {
    fn notify(&self, event: &RotationEvent) {
        self.events.lock().push(event.clone());
    }
}
