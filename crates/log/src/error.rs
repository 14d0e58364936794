//! Error handling for lbcert-log

/// Errors raised while installing the global subscriber
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The level directive could not be parsed by `EnvFilter`
    #[error("Invalid filter '{filter}': {reason}")]
    Filter {
        /// The directive as supplied
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Unknown output format name
    #[error("Unknown log format '{0}' (expected pretty, compact or json)")]
    Format(String),

    /// A global subscriber was already installed
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Result type for logging operations
pub type LogResult<T> = Result<T, LogError>;
