//! Rotation Orchestrator
//!
//! Sequences provisioning, rebinding and reaping through a strictly linear
//! state machine:
//!
//! ```text
//! Init → CreatingCertificate → AwaitingCreate → Rebinding → AwaitingRebind
//!      → Reaping → AwaitingReap → Done
//! ```
//!
//! The first error moves the rotation to `Failed`. Nothing is retried and
//! nothing is rolled back; the returned [`RotationFailure`] carries what was
//! already applied.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use lbcert_cloud::{LoadBalancerApi, WorkRequestId, WorkRequestState};
use lbcert_resilience::PollPolicy;
use parking_lot::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{RotationError, RotationFailure, RotationResult};
use crate::events::{RotationEvent, RotationObserver, TracingObserver, WorkKind};
use crate::provisioner::CertificateProvisioner;
use crate::reaper::{AbsentCertificate, CertificateReaper};
use crate::rebinder::{ListenerRebinder, RebindMode};
use crate::report::{ListenerChange, RetainedCertificate, RotationProgress, RotationReport};
use crate::request::RotationRequest;
use crate::state::RotationState;
use crate::superseded::SupersededCertificates;
use crate::waiter::WorkRequestWaiter;

/// Runs certificate rotations against one load balancer API
pub struct RotationOrchestrator {
    api: Arc<dyn LoadBalancerApi>,
    poll_policy: PollPolicy,
    rebind_mode: RebindMode,
    absent_certificate: AbsentCertificate,
    reference_guard: bool,
    observer: Arc<dyn RotationObserver>,
}

impl std::fmt::Debug for RotationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationOrchestrator")
            .field("poll_policy", &self.poll_policy)
            .field("rebind_mode", &self.rebind_mode)
            .field("absent_certificate", &self.absent_certificate)
            .field("reference_guard", &self.reference_guard)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RotationOrchestrator`]
pub struct RotationOrchestratorBuilder {
    api: Arc<dyn LoadBalancerApi>,
    poll_policy: PollPolicy,
    rebind_mode: RebindMode,
    absent_certificate: AbsentCertificate,
    reference_guard: bool,
    observer: Option<Arc<dyn RotationObserver>>,
}

impl RotationOrchestratorBuilder {
    /// Polling policy for every work request
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// When missing listeners are detected
    pub fn rebind_mode(mut self, mode: RebindMode) -> Self {
        self.rebind_mode = mode;
        self
    }

    /// Handling of superseded certificates that are already gone
    pub fn absent_certificate(mut self, handling: AbsentCertificate) -> Self {
        self.absent_certificate = handling;
        self
    }

    /// Keep superseded certificates that any listener still serves
    pub fn reference_guard(mut self, enabled: bool) -> Self {
        self.reference_guard = enabled;
        self
    }

    /// Event sink; defaults to [`TracingObserver`]
    pub fn observer(mut self, observer: Arc<dyn RotationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate the polling policy and build
    pub fn build(self) -> RotationResult<RotationOrchestrator> {
        self.poll_policy
            .validate()
            .map_err(|e| RotationError::configuration(e.to_string()))?;
        Ok(RotationOrchestrator {
            api: self.api,
            poll_policy: self.poll_policy,
            rebind_mode: self.rebind_mode,
            absent_certificate: self.absent_certificate,
            reference_guard: self.reference_guard,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
        })
    }
}

impl RotationOrchestrator {
    /// Orchestrator with default settings
    pub fn new(api: Arc<dyn LoadBalancerApi>) -> Self {
        Self {
            api,
            poll_policy: PollPolicy::default(),
            rebind_mode: RebindMode::default(),
            absent_certificate: AbsentCertificate::default(),
            reference_guard: true,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Start configuring an orchestrator
    pub fn builder(api: Arc<dyn LoadBalancerApi>) -> RotationOrchestratorBuilder {
        RotationOrchestratorBuilder {
            api,
            poll_policy: PollPolicy::default(),
            rebind_mode: RebindMode::default(),
            absent_certificate: AbsentCertificate::default(),
            reference_guard: true,
            observer: None,
        }
    }

    /// Rotate the certificate described by `request`
    pub async fn rotate(&self, request: RotationRequest) -> Result<RotationReport, RotationFailure> {
        let rotation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "rotation",
            %rotation_id,
            load_balancer = %request.load_balancer_id(),
            certificate = %request.certificate().name,
        );

        let mut run = Run::new(self.observer.clone());
        match self.execute(&mut run, &request, rotation_id).instrument(span).await {
            Ok(report) => {
                tracing::info!(
                    %rotation_id,
                    deleted = report.deleted.len(),
                    retained = report.retained.len(),
                    "Rotation complete"
                );
                Ok(report)
            }
            Err(error) => {
                let phase = run.state;
                run.fail();
                tracing::warn!(%rotation_id, %phase, error = %error, "Rotation failed");
                Err(RotationFailure {
                    phase,
                    error,
                    progress: run.progress(),
                })
            }
        }
    }

    async fn execute(
        &self,
        run: &mut Run,
        request: &RotationRequest,
        rotation_id: Uuid,
    ) -> RotationResult<RotationReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let lb = request.load_balancer_id();
        let bundle = request.certificate();
        let observer: Arc<dyn RotationObserver> = run.observer.clone();
        let waiter = WorkRequestWaiter::new(self.api.clone(), self.poll_policy.clone());

        tracing::info!(listeners = request.listeners().len(), "Starting certificate rotation");

        run.advance(RotationState::CreatingCertificate)?;
        let create_work_request = CertificateProvisioner::new(self.api.clone(), observer.clone())
            .create(lb, bundle)
            .await?;

        run.advance(RotationState::AwaitingCreate)?;
        run.await_work(&waiter, WorkKind::CreateCertificate, &bundle.name, &create_work_request)
            .await?;

        run.advance(RotationState::Rebinding)?;
        let rebind = ListenerRebinder::new(self.api.clone(), self.rebind_mode, observer.clone())
            .rebind(lb, request.listeners(), &bundle.name)
            .await?;

        run.advance(RotationState::AwaitingRebind)?;
        for submission in &rebind.submissions {
            run.await_work(
                &waiter,
                WorkKind::UpdateListener,
                &submission.listener,
                &submission.work_request,
            )
            .await?;
        }

        run.advance(RotationState::Reaping)?;
        let (doomed, retained) = if self.reference_guard {
            self.still_referenced(lb, &rebind.superseded, run).await?
        } else {
            (rebind.superseded.to_vec(), Vec::new())
        };
        let reap = CertificateReaper::new(self.api.clone(), self.absent_certificate, observer)
            .reap(lb, &doomed)
            .await?;

        run.advance(RotationState::AwaitingReap)?;
        for (certificate, work_request) in &reap.submissions {
            run.await_work(&waiter, WorkKind::DeleteCertificate, certificate, work_request)
                .await?;
        }

        run.advance(RotationState::Done)?;

        Ok(RotationReport {
            rotation_id,
            load_balancer_id: lb.to_owned(),
            certificate_name: bundle.name.clone(),
            create_work_request,
            listeners: rebind
                .submissions
                .iter()
                .map(|s| ListenerChange {
                    listener: s.listener.clone(),
                    previous_certificate: s.previous_certificate.clone(),
                    work_request: s.work_request.clone(),
                })
                .collect(),
            superseded: rebind.superseded.to_vec(),
            deleted: reap.submissions.into_iter().map(|(name, _)| name).collect(),
            already_absent: reap.already_absent,
            retained,
            started_at,
            finished_at: Utc::now(),
            duration: clock.elapsed(),
        })
    }

    /// Split superseded names into deletable and still-served
    async fn still_referenced(
        &self,
        load_balancer_id: &str,
        superseded: &SupersededCertificates,
        run: &Run,
    ) -> RotationResult<(Vec<String>, Vec<RetainedCertificate>)> {
        let snapshot = self
            .api
            .get_load_balancer(load_balancer_id)
            .await
            .map_err(|e| RotationError::cloud("get_load_balancer", e))?;

        let mut doomed = Vec::new();
        let mut retained = Vec::new();
        for name in superseded.iter() {
            let users: Vec<String> = snapshot
                .listeners
                .values()
                .filter(|l| l.certificate_name() == Some(name))
                .map(|l| l.name.clone())
                .collect();
            if users.is_empty() {
                doomed.push(name.to_owned());
            } else {
                run.observer.notify(&RotationEvent::CertificateRetained {
                    certificate: name.to_owned(),
                    listeners: users.clone(),
                });
                retained.push(RetainedCertificate {
                    certificate: name.to_owned(),
                    listeners: users,
                });
            }
        }
        Ok((doomed, retained))
    }
}

/// Mutable state of one `rotate` call
struct Run {
    state: RotationState,
    observer: Arc<ProgressObserver>,
}

impl Run {
    fn new(inner: Arc<dyn RotationObserver>) -> Self {
        Self {
            state: RotationState::Init,
            observer: Arc::new(ProgressObserver {
                inner,
                progress: Mutex::new(RotationProgress::default()),
            }),
        }
    }

    fn advance(&mut self, to: RotationState) -> RotationResult<()> {
        let from = self.state;
        self.state = from.transition_to(to)?;
        self.observer.notify(&RotationEvent::StateChanged { from, to });
        Ok(())
    }

    fn fail(&mut self) {
        if self.state.can_transition_to(RotationState::Failed) {
            let from = self.state;
            self.state = RotationState::Failed;
            self.observer.notify(&RotationEvent::StateChanged {
                from,
                to: RotationState::Failed,
            });
        }
    }

    fn progress(&self) -> RotationProgress {
        self.observer.progress.lock().clone()
    }

    async fn await_work(
        &self,
        waiter: &WorkRequestWaiter,
        kind: WorkKind,
        target: &str,
        work_request: &WorkRequestId,
    ) -> RotationResult<()> {
        let outcome = waiter.wait(work_request).await;
        let state = match &outcome {
            Ok(snapshot) => Some(snapshot.state),
            Err(RotationError::OperationFailed { .. }) => Some(WorkRequestState::Failed),
            Err(_) => None,
        };
        if let Some(state) = state {
            self.observer.notify(&RotationEvent::WorkRequestCompleted {
                kind,
                target: target.to_owned(),
                work_request: work_request.clone(),
                state,
            });
        }
        outcome.map(|_| ())
    }
}

/// Folds events into [`RotationProgress`] before forwarding them
struct ProgressObserver {
    inner: Arc<dyn RotationObserver>,
    progress: Mutex<RotationProgress>,
}

impl RotationObserver for ProgressObserver {
    fn notify(&self, event: &RotationEvent) {
        self.progress.lock().record(event);
        self.inner.notify(event);
    }
}
