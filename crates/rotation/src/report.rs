//! What a rotation did

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lbcert_cloud::{WorkRequestId, WorkRequestState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{RotationEvent, WorkKind};

/// Mutations in effect, derived from the event stream
///
/// Carried by [`RotationFailure`](crate::RotationFailure) so an operator can
/// tell what a partial rotation left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationProgress {
    /// Create-certificate was accepted
    pub certificate_submitted: bool,
    /// The new certificate exists
    pub certificate_created: bool,
    /// Listeners whose update was accepted
    pub listeners_submitted: Vec<String>,
    /// Listeners confirmed on the new certificate
    pub listeners_rebound: Vec<String>,
    /// Certificates whose delete was accepted
    pub deletions_submitted: Vec<String>,
    /// Certificates confirmed deleted
    pub certificates_deleted: Vec<String>,
}

impl RotationProgress {
    /// Fold one event in
    pub fn record(&mut self, event: &RotationEvent) {
        match event {
            RotationEvent::WorkRequestSubmitted { kind, target, .. } => match kind {
                WorkKind::CreateCertificate => self.certificate_submitted = true,
                WorkKind::UpdateListener => self.listeners_submitted.push(target.clone()),
                WorkKind::DeleteCertificate => self.deletions_submitted.push(target.clone()),
            },
            RotationEvent::WorkRequestCompleted {
                kind,
                target,
                state: WorkRequestState::Succeeded,
                ..
            } => match kind {
                WorkKind::CreateCertificate => self.certificate_created = true,
                WorkKind::UpdateListener => self.listeners_rebound.push(target.clone()),
                WorkKind::DeleteCertificate => self.certificates_deleted.push(target.clone()),
            },
            _ => {}
        }
    }

    /// Nothing reached the load balancer
    pub fn is_untouched(&self) -> bool {
        !self.certificate_submitted
            && self.listeners_submitted.is_empty()
            && self.deletions_submitted.is_empty()
    }
}

/// One repointed listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerChange {
    /// Listener name
    pub listener: String,
    /// Certificate served before the rotation
    pub previous_certificate: Option<String>,
    /// Update work request
    pub work_request: WorkRequestId,
}

/// Superseded certificate kept because something still serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedCertificate {
    /// Certificate name
    pub certificate: String,
    /// Listeners still serving it
    pub listeners: Vec<String>,
}

/// Outcome of a successful rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationReport {
    /// Identifier for correlating logs
    pub rotation_id: Uuid,
    /// Load balancer rotated
    pub load_balancer_id: String,
    /// Certificate now served
    pub certificate_name: String,
    /// Create-certificate work request
    pub create_work_request: WorkRequestId,
    /// Listener updates, in request order
    pub listeners: Vec<ListenerChange>,
    /// Certificates displaced by the rebind
    pub superseded: Vec<String>,
    /// Certificates deleted
    pub deleted: Vec<String>,
    /// Certificates that were gone before their delete
    pub already_absent: Vec<String>,
    /// Certificates kept because a listener still serves them
    pub retained: Vec<RetainedCertificate>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Completion time
    pub finished_at: DateTime<Utc>,
    /// Wall time spent
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl RotationReport {
    /// Multi-line human summary
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Rotated load balancer {} to certificate {} in {}\n",
            self.load_balancer_id,
            self.certificate_name,
            humantime_serde::re::humantime::format_duration(round_to_millis(self.duration)),
        );
        for change in &self.listeners {
            let _ = writeln!(
                out,
                "  listener {}: {} -> {}",
                change.listener,
                change.previous_certificate.as_deref().unwrap_or("(none)"),
                self.certificate_name
            );
        }
        if !self.deleted.is_empty() {
            let _ = writeln!(out, "  deleted: {}", self.deleted.join(", "));
        }
        if !self.already_absent.is_empty() {
            let _ = writeln!(out, "  already absent: {}", self.already_absent.join(", "));
        }
        for kept in &self.retained {
            let _ = writeln!(
                out,
                "  retained {} (still used by {})",
                kept.certificate,
                kept.listeners.join(", ")
            );
        }
        out
    }
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
