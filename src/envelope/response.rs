//! Response envelope written back to the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::executor::result::{ExecutionResult, ExecutionStatus};
use crate::resilience::retry::RetryResult;

/// Terminal request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    Success,
    Failure,
}

/// Outcome tag of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Success,
    TransientFailure,
    PermanentFailure,
}

impl From<ExecutionStatus> for AttemptOutcome {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Success => AttemptOutcome::Success,
            ExecutionStatus::TransientFailure => AttemptOutcome::TransientFailure,
            ExecutionStatus::PermanentFailure => AttemptOutcome::PermanentFailure,
        }
    }
}

/// Per-attempt entry in the response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ExecutionResult> for AttemptSummary {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            attempt: result.attempt,
            outcome: result.status.into(),
            message: result.error.as_ref().map(|detail| detail.message.clone()),
        }
    }
}

/// Executor-specific payload of the response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExecutorResult {
    Http {
        http_status: u16,
        headers: BTreeMap<String, String>,
        body: String,
    },
    Shell {
        ps_command: String,
        ps_stdout: Vec<String>,
        ps_stderr: Vec<String>,
        ps_objects: Vec<serde_json::Value>,
    },
    Failure {
        error_code: String,
        error: String,
        is_transient: bool,
        /// Downstream status carried through on status-classified HTTP
        /// failures; the body and headers ride along with it.
        #[serde(skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<BTreeMap<String, String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
}

impl From<&ExecutionResult> for ExecutorResult {
    fn from(result: &ExecutionResult) -> Self {
        if result.is_success() {
            if let Some(shell) = &result.shell {
                return ExecutorResult::Shell {
                    ps_command: shell.command.clone(),
                    ps_stdout: shell.stdout.clone(),
                    ps_stderr: shell.stderr.clone(),
                    ps_objects: shell.objects.clone(),
                };
            }
            if let Some(http) = &result.http {
                return ExecutorResult::Http {
                    http_status: http.status_code,
                    headers: http.headers.clone(),
                    body: http.body.clone(),
                };
            }
        }
        let (code, message) = result
            .error
            .as_ref()
            .map(|detail| (detail.code.clone(), detail.message.clone()))
            .unwrap_or_else(|| ("Unknown".to_string(), "no failure detail recorded".to_string()));
        ExecutorResult::Failure {
            error_code: code,
            error: message,
            is_transient: result.is_transient(),
            http_status: result.http.as_ref().map(|http| http.status_code),
            headers: result.http.as_ref().map(|http| http.headers.clone()),
            body: result.http.as_ref().map(|http| http.body.clone()),
        }
    }
}

/// Body of the dispatch response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub executor_type: String,
    /// Start of the first attempt.
    pub started_at: DateTime<Utc>,
    /// End of the last attempt.
    pub completed_at: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub attempts: u32,
    pub attempt_summaries: Vec<AttemptSummary>,
    pub executor_result: ExecutorResult,
}

impl ResponseEnvelope {
    /// Assemble the envelope from a finished retry run.
    pub fn build(
        request_id: String,
        correlation_id: Option<String>,
        executor_type: &str,
        outcome: &RetryResult,
    ) -> Self {
        let last = outcome.last();
        Self {
            request_id,
            correlation_id,
            executor_type: executor_type.to_string(),
            started_at: outcome.attempts.first().map(|a| a.started_at).unwrap_or(last.started_at),
            completed_at: last.completed_at,
            overall_status: if last.is_success() {
                OverallStatus::Success
            } else {
                OverallStatus::Failure
            },
            attempts: outcome.attempts.len() as u32,
            attempt_summaries: outcome.attempts.iter().map(AttemptSummary::from).collect(),
            executor_result: ExecutorResult::from(last),
        }
    }
}

/// JSON body for pre-dispatch rejections (validation failures, unknown
/// executor).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::result::{codes, HttpOutcome};
    use chrono::Utc;

    #[test]
    fn failure_results_serialize_with_failure_shape() {
        let now = Utc::now();
        let result = ExecutionResult::failure(codes::BAD_CONFIGURATION, "no base", false, now, now);
        let json = serde_json::to_value(ExecutorResult::from(&result)).unwrap();
        assert_eq!(json["error_code"], "BadConfiguration");
        assert_eq!(json["is_transient"], false);
    }

    #[test]
    fn http_success_serializes_with_http_shape() {
        let now = Utc::now();
        let result = ExecutionResult::http_success(
            now,
            now,
            HttpOutcome {
                status_code: 201,
                headers: [("Content-Type".to_string(), "text/plain".to_string())].into(),
                body: "created".to_string(),
            },
        );
        let json = serde_json::to_value(ExecutorResult::from(&result)).unwrap();
        assert_eq!(json["http_status"], 201);
        assert_eq!(json["body"], "created");
    }

    #[test]
    fn http_failure_still_renders_failure_shape() {
        let now = Utc::now();
        let result = ExecutionResult::http_failure(
            codes::HTTP_STATUS,
            "downstream returned 503",
            true,
            HttpOutcome {
                status_code: 503,
                headers: Default::default(),
                body: "oops".to_string(),
            },
            now,
            now,
        );
        let json = serde_json::to_value(ExecutorResult::from(&result)).unwrap();
        assert_eq!(json["error_code"], "HttpStatus");
        assert_eq!(json["is_transient"], true);
        // The downstream payload rides along on status-classified failures.
        assert_eq!(json["http_status"], 503);
        assert_eq!(json["body"], "oops");
    }

    #[test]
    fn outcome_tags_use_closed_set() {
        assert_eq!(
            serde_json::to_value(AttemptOutcome::TransientFailure).unwrap(),
            "TransientFailure"
        );
        assert_eq!(serde_json::to_value(AttemptOutcome::Success).unwrap(), "Success");
    }
}
