//! # lbcert-rotation
//!
//! Replaces the certificate served by a set of load balancer listeners.
//!
//! A rotation registers the new certificate, repoints every target listener
//! at it, and deletes the certificates those listeners used to serve. Each
//! step is an asynchronous work request on the service side and is polled to
//! completion before the next step starts.
//!
//! - [`RotationOrchestrator`]: runs the whole sequence as a state machine.
//! - [`WorkRequestWaiter`], [`CertificateProvisioner`], [`ListenerRebinder`],
//!   [`CertificateReaper`]: the individual steps.
//! - [`RotationObserver`]: receives every [`RotationEvent`].
//!
//! ```rust,ignore
//! let orchestrator = RotationOrchestrator::builder(api)
//!     .poll_policy(PollPolicy::default().with_deadline(Duration::from_secs(900)))
//!     .build()?;
//!
//! let request = RotationRequest::builder()
//!     .load_balancer(lb_id)
//!     .listeners(["https", "https-alt"])
//!     .certificate(CertificateBundle::new(name, key, chain))
//!     .build()?;
//!
//! let report = orchestrator.rotate(request).await?;
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod events;
mod orchestrator;
mod provisioner;
mod reaper;
mod rebinder;
mod report;
mod request;
mod state;
mod superseded;
mod waiter;

pub use error::{RotationError, RotationFailure, RotationResult};
pub use events::{RecordingObserver, RotationEvent, RotationObserver, TracingObserver, WorkKind};
pub use orchestrator::{RotationOrchestrator, RotationOrchestratorBuilder};
pub use provisioner::CertificateProvisioner;
pub use reaper::{AbsentCertificate, CertificateReaper, ReapOutcome};
pub use rebinder::{ListenerRebinder, ListenerSubmission, RebindMode, RebindOutcome};
pub use report::{ListenerChange, RetainedCertificate, RotationProgress, RotationReport};
pub use request::{CertificateBundle, CertificateName, RotationRequest, RotationRequestBuilder};
pub use state::RotationState;
pub use superseded::SupersededCertificates;
pub use waiter::WorkRequestWaiter;
