//! # lbcert-log
//!
//! Logging bootstrap shared by every lbcert binary and test harness.
//!
//! ```rust,no_run
//! fn main() -> Result<(), lbcert_log::LogError> {
//!     let _guard = lbcert_log::auto_init()?;
//!     tracing::info!(load_balancer = "ocid1.loadbalancer...", "starting rotation");
//!     Ok(())
//! }
//! ```
//!
//! The configuration is read from `LBCERT_LOG` (falling back to `RUST_LOG`) and
//! `LBCERT_LOG_FORMAT`; see [`Config::from_env`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;
mod format;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format, WriterConfig};
pub use error::{LogError, LogResult};

/// Auto-detect and initialize the best logging configuration
///
/// An explicit filter in the environment wins; otherwise debug builds get
/// [`Config::development`] and release builds [`Config::production`].
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("LBCERT_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
