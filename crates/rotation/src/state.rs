//! Rotation State Machine
//!
//! Tracks which step of a rotation is running.

use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};

/// State of a rotation
///
/// # State Transitions
///
/// ```text
/// Init → CreatingCertificate → AwaitingCreate → Rebinding → AwaitingRebind
///      → Reaping → AwaitingReap → Done
///   ↓          ↓                    ↓            ↓               ↓
///   → Failed ← ← ← ← ← ← ← ← ← ← ← ← (error at any non-terminal state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationState {
    /// Request accepted, nothing submitted yet
    Init,

    /// Submitting the create-certificate call
    CreatingCertificate,

    /// Waiting for the certificate to exist
    AwaitingCreate,

    /// Repointing target listeners
    Rebinding,

    /// Waiting for every listener update
    AwaitingRebind,

    /// Submitting deletes for superseded certificates
    Reaping,

    /// Waiting for every delete
    AwaitingReap,

    /// Every step succeeded
    Done,

    /// A step failed; nothing was rolled back
    Failed,
}

impl RotationState {
    /// Check if transition to the target state is valid
    #[must_use]
    pub fn can_transition_to(&self, target: RotationState) -> bool {
        use RotationState::{
            AwaitingCreate, AwaitingReap, AwaitingRebind, CreatingCertificate, Done, Failed, Init,
            Rebinding, Reaping,
        };

        match (self, target) {
            // Forward progress, one step at a time
            (Init, CreatingCertificate)
            | (CreatingCertificate, AwaitingCreate)
            | (AwaitingCreate, Rebinding)
            | (Rebinding, AwaitingRebind)
            | (AwaitingRebind, Reaping)
            | (Reaping, AwaitingReap)
            | (AwaitingReap, Done) => true,

            // Failure from any active state
            (from, Failed) => !from.is_terminal(),

            _ => false,
        }
    }

    /// Validate and perform state transition
    pub fn transition_to(&self, target: RotationState) -> RotationResult<RotationState> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(RotationError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if state is terminal (no more transitions possible)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RotationState::Done | RotationState::Failed)
    }
}

impl std::fmt::Display for RotationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationState::Init => write!(f, "init"),
            RotationState::CreatingCertificate => write!(f, "creating_certificate"),
            RotationState::AwaitingCreate => write!(f, "awaiting_create"),
            RotationState::Rebinding => write!(f, "rebinding"),
            RotationState::AwaitingRebind => write!(f, "awaiting_rebind"),
            RotationState::Reaping => write!(f, "reaping"),
            RotationState::AwaitingReap => write!(f, "awaiting_reap"),
            RotationState::Done => write!(f, "done"),
            RotationState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const HAPPY_PATH: [RotationState; 8] = [
        RotationState::Init,
        RotationState::CreatingCertificate,
        RotationState::AwaitingCreate,
        RotationState::Rebinding,
        RotationState::AwaitingRebind,
        RotationState::Reaping,
        RotationState::AwaitingReap,
        RotationState::Done,
    ];

    #[test]
    fn test_valid_forward_transitions() {
        for pair in HAPPY_PATH.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} must be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_failure_reachable_from_every_active_state() {
        for state in &HAPPY_PATH[..7] {
            assert!(state.can_transition_to(RotationState::Failed), "{state}");
        }
    }

    #[rstest]
    #[case::skip_wait(RotationState::CreatingCertificate, RotationState::Rebinding)]
    #[case::skip_rebind(RotationState::AwaitingCreate, RotationState::Reaping)]
    #[case::backwards(RotationState::Reaping, RotationState::Rebinding)]
    #[case::self_loop(RotationState::Rebinding, RotationState::Rebinding)]
    #[case::from_done(RotationState::Done, RotationState::Failed)]
    #[case::from_failed(RotationState::Failed, RotationState::Init)]
    fn test_invalid_transitions(#[case] from: RotationState, #[case] to: RotationState) {
        assert!(!from.can_transition_to(to));
        assert!(matches!(
            from.transition_to(to),
            Err(RotationError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RotationState::Done.is_terminal());
        assert!(RotationState::Failed.is_terminal());
        assert!(!RotationState::AwaitingReap.is_terminal());
    }

    #[test]
    fn display_matches_serde_name() {
        for state in HAPPY_PATH {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
