//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch hands the selected executor to retry.rs:
//!     → per-attempt child cancellation with a deadline timer
//!     → executor invocation, failure capture
//!     → backoff.rs (exponential delay + additive jitter) between attempts
//!     → accumulated attempt history returned to dispatch
//! ```
//!
//! # Design Decisions
//! - Every attempt has a deadline; deadline cancellation is distinguishable
//!   from outer (connection/shutdown) cancellation
//! - Only transient results are retried; the executor owns classification
//! - The backoff sleep observes the outer signal so a dead caller stops
//!   the loop

pub mod backoff;
pub mod retry;

pub use retry::{RetryController, RetryResult};
