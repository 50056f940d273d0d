//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request (http/server.rs catch-all)
//!     → controller.rs (envelope build, size limits, request id)
//!     → validator.rs (structural checks, closed failure-code set)
//!     → executor registry lookup (X-Executor-Type, default http)
//!     → resilience::retry (attempt loop)
//!     → envelope::response (serialized reply + traceability headers)
//!     → observability::metrics (counters + latency sample)
//! ```
//!
//! # Design Decisions
//! - Validation failures and unknown executors are rejected with HTTP 400
//!   before any executor runs
//! - Executor-level failures still produce HTTP 200: the outer status says
//!   whether the gateway processed the request, not whether the downstream
//!   call succeeded

pub mod controller;
pub mod validator;

pub use validator::{Validation, ValidationCode, Validator};
