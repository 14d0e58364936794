//! # lbcert-resilience
//!
//! Policies for observing long-running cloud operations.
//!
//! - [`PollPolicy`] + [`poll_until`]: re-check a condition until it resolves,
//!   with a fixed (default) or exponential interval and an optional deadline.
//! - [`RetryPolicy`] + [`retry_with_backoff`]: repeat an idempotent call that
//!   failed transiently.
//!
//! Both are plain data so callers can inject an immediate-resolution policy
//! in tests instead of sleeping in real time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod poll;
mod retry;

pub use error::{ConfigError, PollError};
pub use poll::{Backoff, PollPolicy, Probe, poll_until};
pub use retry::{RetryPolicy, retry_with_backoff};
