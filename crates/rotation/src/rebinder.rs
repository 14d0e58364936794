//! Listener rebinding
//!
//! Repoints each target listener at the new certificate and records which
//! certificates it served before.

use std::sync::Arc;

use indexmap::IndexSet;
use lbcert_cloud::{LoadBalancer, LoadBalancerApi, ListenerUpdate, WorkRequestId};
use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};
use crate::events::{RotationEvent, RotationObserver, WorkKind};
use crate::superseded::SupersededCertificates;

/// When missing target listeners are detected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebindMode {
    /// Check each listener as it is reached; earlier updates stay submitted
    #[default]
    Interleaved,
    /// Check every listener before submitting anything
    Prevalidate,
}

/// One submitted listener update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSubmission {
    /// Listener name
    pub listener: String,
    /// Certificate the listener served in the snapshot
    pub previous_certificate: Option<String>,
    /// Update work request
    pub work_request: WorkRequestId,
}

/// Result of [`ListenerRebinder::rebind`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebindOutcome {
    /// Submitted updates, in caller order
    pub submissions: Vec<ListenerSubmission>,
    /// Certificates displaced by the updates
    pub superseded: SupersededCertificates,
}

impl RebindOutcome {
    /// Work requests to wait on, in submission order
    pub fn work_requests(&self) -> Vec<WorkRequestId> {
        self.submissions
            .iter()
            .map(|s| s.work_request.clone())
            .collect()
    }
}

/// Submits listener updates; never waits
pub struct ListenerRebinder {
    api: Arc<dyn LoadBalancerApi>,
    mode: RebindMode,
    observer: Arc<dyn RotationObserver>,
}

impl ListenerRebinder {
    /// Rebinder in `mode`, reporting submissions to `observer`
    pub fn new(
        api: Arc<dyn LoadBalancerApi>,
        mode: RebindMode,
        observer: Arc<dyn RotationObserver>,
    ) -> Self {
        Self {
            api,
            mode,
            observer,
        }
    }

    /// Point every listener in `targets` at `new_certificate`
    ///
    /// The listener map is fetched once, up front. Port, protocol, backend
    /// set and every other attribute are carried over from that snapshot.
    pub async fn rebind(
        &self,
        load_balancer_id: &str,
        targets: &IndexSet<String>,
        new_certificate: &str,
    ) -> RotationResult<RebindOutcome> {
        let snapshot = self
            .api
            .get_load_balancer(load_balancer_id)
            .await
            .map_err(|e| RotationError::cloud("get_load_balancer", e))?;

        if self.mode == RebindMode::Prevalidate
            && let Some(missing) = targets.iter().find(|name| snapshot.listener(name).is_none())
        {
            return Err(missing_listener(&snapshot, missing, &[]));
        }

        let mut outcome = RebindOutcome::default();
        for name in targets {
            let Some(listener) = snapshot.listener(name) else {
                let submitted: Vec<String> =
                    outcome.submissions.iter().map(|s| s.listener.clone()).collect();
                return Err(missing_listener(&snapshot, name, &submitted));
            };

            let previous = listener.certificate_name().map(str::to_owned);
            let update = ListenerUpdate::from_listener(listener).with_certificate(new_certificate);

            let work_request = self
                .api
                .update_listener(load_balancer_id, name, &update)
                .await
                .map_err(|e| RotationError::cloud("update_listener", e))?;
            self.observer.notify(&RotationEvent::WorkRequestSubmitted {
                kind: WorkKind::UpdateListener,
                target: name.clone(),
                work_request: work_request.clone(),
            });

            if let Some(previous) = previous.as_deref() {
                outcome.superseded.record(previous, new_certificate);
            }
            outcome.submissions.push(ListenerSubmission {
                listener: name.clone(),
                previous_certificate: previous,
                work_request,
            });
        }
        Ok(outcome)
    }
}

fn missing_listener(snapshot: &LoadBalancer, listener: &str, submitted: &[String]) -> RotationError {
    RotationError::ListenerNotFound {
        listener: listener.to_owned(),
        load_balancer: snapshot.id.clone(),
        already_submitted: submitted.to_vec(),
    }
}
