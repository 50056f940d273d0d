//! Tagged outcome of a single executor invocation.
//!
//! Executors never surface Rust errors for recognized failure modes; they
//! translate everything into an [`ExecutionResult`] so the retry
//! controller can classify it. Success and transience are mutually
//! exclusive by construction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Failure codes produced by the pipeline.
pub mod codes {
    /// Required header missing for the selected executor.
    pub const BAD_CONFIGURATION: &str = "BadConfiguration";
    /// Forward base URL did not parse.
    pub const INVALID_URI: &str = "InvalidUri";
    /// Transport-level failure talking to the downstream service.
    pub const NETWORK_ERROR: &str = "NetworkError";
    /// Attempt deadline elapsed or cancellation observed.
    pub const TIMEOUT: &str = "Timeout";
    /// Failure escaped an executor before it produced a result.
    pub const EXECUTOR_EXCEPTION: &str = "ExecutorException";
    /// Shell executor invoked without a command.
    pub const MISSING_COMMAND: &str = "MissingCommand";
    /// Command not in the configured allowlist.
    pub const COMMAND_NOT_ALLOWED: &str = "CommandNotAllowed";
    /// Shell session failure; transient iff the message says so.
    pub const PS_FAILURE: &str = "PSFailure";
    /// Downstream HTTP status outside 2xx.
    pub const HTTP_STATUS: &str = "HttpStatus";
}

/// Discriminated attempt outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    TransientFailure,
    PermanentFailure,
}

/// Downstream HTTP payload. Present on success and, per the response
/// contract, on status-classified failures too.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpOutcome {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Structured output of a simulated shell session.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellOutcome {
    /// Full rendered command line.
    pub command: String,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Opaque records emitted by the command.
    pub objects: Vec<serde_json::Value>,
}

/// Failure tag and human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDetail {
    pub code: String,
    pub message: String,
}

/// Outcome of one executor invocation.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// 1-based ordinal, stamped by the retry controller.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub http: Option<HttpOutcome>,
    pub shell: Option<ShellOutcome>,
    pub error: Option<FailureDetail>,
}

impl ExecutionResult {
    pub fn http_success(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcome: HttpOutcome,
    ) -> Self {
        Self {
            status: ExecutionStatus::Success,
            attempt: 0,
            started_at,
            completed_at,
            http: Some(outcome),
            shell: None,
            error: None,
        }
    }

    pub fn shell_success(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcome: ShellOutcome,
    ) -> Self {
        Self {
            status: ExecutionStatus::Success,
            attempt: 0,
            started_at,
            completed_at,
            http: None,
            shell: Some(outcome),
            error: None,
        }
    }

    pub fn failure(
        code: &str,
        message: impl Into<String>,
        transient: bool,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: if transient {
                ExecutionStatus::TransientFailure
            } else {
                ExecutionStatus::PermanentFailure
            },
            attempt: 0,
            started_at,
            completed_at,
            http: None,
            shell: None,
            error: Some(FailureDetail {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    /// Status-classified HTTP failure; keeps the downstream payload.
    pub fn http_failure(
        code: &str,
        message: impl Into<String>,
        transient: bool,
        outcome: HttpOutcome,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut result = Self::failure(code, message, transient, started_at, completed_at);
        result.http = Some(outcome);
        result
    }

    /// Transient timeout, used for both attempt deadlines and observed
    /// cancellation.
    pub fn timeout(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Self {
        Self::failure(codes::TIMEOUT, "attempt timed out", true, started_at, completed_at)
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_transient(&self) -> bool {
        self.status == ExecutionStatus::TransientFailure
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|detail| detail.code.as_str())
    }
}
