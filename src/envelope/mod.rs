//! Request/response data contracts.
//!
//! # Data Flow
//! ```text
//! inbound HTTP request
//!     → request.rs (immutable RequestEnvelope, case-insensitive views)
//!     → [dispatch pipeline: validate, select, retry]
//!     → response.rs (ResponseEnvelope + attempt summaries, serialized as
//!       the dispatch response body)
//! ```
//!
//! # Design Decisions
//! - The envelope is immutable after construction and passed by reference
//! - Header and query lookups are case-insensitive; original casing is
//!   preserved for forwarding
//! - Response shapes carry serde renames so the wire format is explicit

pub mod request;
pub mod response;

pub use request::{CaseInsensitiveMap, RequestEnvelope};
pub use response::{AttemptOutcome, AttemptSummary, ErrorBody, ExecutorResult, ResponseEnvelope};
