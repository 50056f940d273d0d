//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch pipeline produces:
//!     → tracing events (structured fields, request_id on every line)
//!     → metrics.rs (counters + latency reservoir)
//!
//! Consumers:
//!     → Log aggregation (stdout via tracing-subscriber)
//!     → GET /metrics (JSON snapshot)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems as a structured field
//! - Counter updates are cheap atomic increments
//! - The latency reservoir is bounded so a long-lived process cannot grow
//!   without limit

pub mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot};
