//! Error types for polling and policy validation

use std::time::Duration;

/// Policy validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Outcome of a poll loop that did not resolve
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// The policy deadline elapsed while the probe was still pending
    #[error("{operation} still pending after {elapsed:?} ({attempts} checks)")]
    Deadline {
        /// Operation name used for logging
        operation: String,
        /// Time spent polling
        elapsed: Duration,
        /// Number of probes issued
        attempts: u32,
    },

    /// The probe itself failed
    #[error(transparent)]
    Probe(E),
}

impl<E> PollError<E> {
    /// Return the probe error, if that is what ended the loop
    pub fn into_probe(self) -> Option<E> {
        match self {
            Self::Probe(e) => Some(e),
            Self::Deadline { .. } => None,
        }
    }
}
