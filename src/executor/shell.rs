//! Allowlist-checked remote-shell executor.
//!
//! # Responsibilities
//! - Enforce the configured command allowlist
//! - Simulate a three-phase session: connect → execute → disconnect
//! - Produce structured stdout/stderr/object output per command
//! - Guarantee disconnect on every exit path
//!
//! # Design Decisions
//! - Every simulated delay honors the cancellation token; cancellation in
//!   any phase yields a transient `Timeout`
//! - Session release is a scoped concern: an explicit close runs after the
//!   command, with a Drop backstop that logs abandoned sessions
//! - Output is deterministic per command so callers can assert on it

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::schema::ShellConfig;
use crate::envelope::request::{
    RequestEnvelope, X_PS_COMMAND, X_PS_FILTER, X_PS_MAX_RESULTS, X_PS_RESULT_SIZE,
};
use crate::executor::result::{codes, ExecutionResult, ShellOutcome};
use crate::executor::{Executor, ExecutorError};

/// Simulated connect latency.
const CONNECT_DELAY: Duration = Duration::from_millis(40);
/// Simulated execution latency.
const EXECUTE_DELAY: Duration = Duration::from_millis(60);
/// Simulated disconnect latency.
const DISCONNECT_DELAY: Duration = Duration::from_millis(20);

/// Closing stdout line emitted by every successful command.
const SIMULATED_OUTPUT_LINE: &str = "Simulated output";

/// Allowlisted remote-shell session simulator.
pub struct ShellExecutor {
    config: ShellConfig,
    clock: Arc<dyn Clock>,
}

impl ShellExecutor {
    pub fn new(config: ShellConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Canonical allowlist entry matching `command`, if any.
    fn allowed_command(&self, command: &str) -> Option<&str> {
        self.config
            .allowed_commands
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(command))
            .map(String::as_str)
    }
}

impl Executor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    fn execute<'a>(
        &'a self,
        envelope: &'a RequestEnvelope,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ExecutionResult, ExecutorError>> {
        Box::pin(async move {
            let started_at = self.clock.now();

            let Some(command) = envelope.header(X_PS_COMMAND) else {
                return Ok(ExecutionResult::failure(
                    codes::MISSING_COMMAND,
                    format!("required header {} is missing", X_PS_COMMAND),
                    false,
                    started_at,
                    self.clock.now(),
                ));
            };

            let Some(command) = self.allowed_command(command) else {
                return Ok(ExecutionResult::failure(
                    codes::COMMAND_NOT_ALLOWED,
                    format!(
                        "command {:?} is not allowed; allowed commands: {}",
                        command,
                        self.config.allowed_commands.join(", ")
                    ),
                    false,
                    started_at,
                    self.clock.now(),
                ));
            };

            let options = SessionOptions::from_envelope(envelope);
            let mut session = ShellSession::open(envelope.request_id.clone());

            let outcome = run_session(&mut session, command, &options, &cancel).await;
            // Disconnect runs on every path; its own failure is logged by
            // the session and never alters the command outcome.
            session.close(&cancel).await;

            let completed_at = self.clock.now();
            Ok(match outcome {
                SessionOutcome::Completed(outcome) => {
                    ExecutionResult::shell_success(started_at, completed_at, outcome)
                }
                SessionOutcome::Cancelled => ExecutionResult::timeout(started_at, completed_at),
                SessionOutcome::Failed(message) => {
                    let transient = is_transient_shell_failure(&message);
                    ExecutionResult::failure(
                        codes::PS_FAILURE,
                        message,
                        transient,
                        started_at,
                        completed_at,
                    )
                }
            })
        })
    }
}

/// Options parsed from the `X-PS-*` headers.
#[derive(Debug, Clone)]
struct SessionOptions {
    filter: Option<String>,
    result_size: String,
    max_results: usize,
}

impl SessionOptions {
    fn from_envelope(envelope: &RequestEnvelope) -> Self {
        let max_results = envelope
            .header(X_PS_MAX_RESULTS)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(100);
        Self {
            filter: envelope.header(X_PS_FILTER).map(str::to_string),
            result_size: envelope
                .header(X_PS_RESULT_SIZE)
                .map(str::to_string)
                .unwrap_or_else(|| "100".to_string()),
            max_results,
        }
    }
}

enum SessionOutcome {
    Completed(ShellOutcome),
    Cancelled,
    Failed(String),
}

/// Connect and execute. Disconnect is the caller's duty so it runs on
/// every path, including cancellation mid-phase.
async fn run_session(
    session: &mut ShellSession,
    command: &str,
    options: &SessionOptions,
    cancel: &CancellationToken,
) -> SessionOutcome {
    if !interruptible_delay(CONNECT_DELAY, cancel).await {
        return SessionOutcome::Cancelled;
    }
    session.connected = true;
    tracing::debug!(request_id = %session.request_id, command, "Shell session connected");

    if !interruptible_delay(EXECUTE_DELAY, cancel).await {
        return SessionOutcome::Cancelled;
    }
    match generate_output(command, options) {
        Ok(outcome) => SessionOutcome::Completed(outcome),
        Err(message) => SessionOutcome::Failed(message),
    }
}

/// Render the full command line: `<cmd> [-Filter "<f>"] -ResultSize <n>`.
fn render_command_line(command: &str, options: &SessionOptions) -> String {
    match &options.filter {
        Some(filter) => format!(
            "{} -Filter \"{}\" -ResultSize {}",
            command, filter, options.result_size
        ),
        None => format!("{} -ResultSize {}", command, options.result_size),
    }
}

/// Deterministic per-command output.
fn generate_output(command: &str, options: &SessionOptions) -> Result<ShellOutcome, String> {
    let rendered = render_command_line(command, options);
    let mut stdout = Vec::new();
    let mut objects = Vec::new();

    if command.eq_ignore_ascii_case("Get-Mailbox") {
        let count = options.max_results.min(5);
        for i in 1..=count {
            let display_name = format!("Mailbox User {}", i);
            let address = format!("user{}@contoso.example", i);
            stdout.push(format!("{} <{}>", display_name, address));
            objects.push(json!({
                "DisplayName": display_name,
                "PrimarySmtpAddress": address,
                "MailboxType": "UserMailbox",
                "DatabaseName": format!("MBX-DB-{:02}", i),
            }));
        }
    } else if command.eq_ignore_ascii_case("Get-User") {
        let departments = ["Engineering", "Finance", "Sales"];
        let count = options.max_results.min(3);
        for i in 1..=count {
            let name = format!("User {}", i);
            let upn = format!("user{}@contoso.example", i);
            stdout.push(format!("{} ({})", name, upn));
            objects.push(json!({
                "Name": name,
                "UserPrincipalName": upn,
                "Department": departments[(i - 1) % departments.len()],
            }));
        }
    } else {
        stdout.push(format!("Command: {}", command));
        stdout.push(format!(
            "Filter: {}",
            options.filter.as_deref().unwrap_or("<none>")
        ));
        stdout.push(format!("ResultSize: {}", options.result_size));
    }

    stdout.push(SIMULATED_OUTPUT_LINE.to_string());

    Ok(ShellOutcome {
        command: rendered,
        stdout,
        stderr: Vec::new(),
        objects,
    })
}

/// Transient iff the failure message names a retryable condition.
fn is_transient_shell_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["busy", "timeout", "unavailable"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Sleep that returns `false` when the token fires first.
async fn interruptible_delay(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Scoped shell session. `close` must run on every exit path; Drop only
/// backstops a session abandoned by a panic.
struct ShellSession {
    request_id: String,
    connected: bool,
    closed: bool,
}

impl ShellSession {
    fn open(request_id: String) -> Self {
        Self {
            request_id,
            connected: false,
            closed: false,
        }
    }

    async fn close(&mut self, cancel: &CancellationToken) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.connected && !cancel.is_cancelled() {
            // The disconnect handshake has its own latency; skip it when
            // the caller is already gone.
            tokio::time::sleep(DISCONNECT_DELAY).await;
        }
        tracing::debug!(request_id = %self.request_id, "Shell session disconnected");
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                request_id = %self.request_id,
                "Shell session dropped without disconnect"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::envelope::request::CaseInsensitiveMap;

    fn envelope(headers: &[(&str, &str)]) -> RequestEnvelope {
        RequestEnvelope {
            request_id: "req-1".to_string(),
            correlation_id: None,
            method: "POST".to_string(),
            path: "mailbox".to_string(),
            query: CaseInsensitiveMap::new(),
            headers: headers.iter().cloned().collect(),
            body: None,
        }
    }

    fn executor() -> ShellExecutor {
        ShellExecutor::new(ShellConfig::default(), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn missing_command_is_permanent() {
        let result = executor()
            .execute(&envelope(&[]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.error_code(), Some(codes::MISSING_COMMAND));
        assert!(!result.is_transient());
    }

    #[tokio::test]
    async fn disallowed_command_lists_the_allowlist() {
        let result = executor()
            .execute(
                &envelope(&[(X_PS_COMMAND, "Remove-Mailbox")]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.error_code(), Some(codes::COMMAND_NOT_ALLOWED));
        let message = &result.error.as_ref().unwrap().message;
        assert!(message.contains("Get-Mailbox"));
        assert!(message.contains("Get-User"));
    }

    #[tokio::test]
    async fn allowlist_match_is_case_insensitive() {
        let result = executor()
            .execute(
                &envelope(&[(X_PS_COMMAND, "get-mailbox")]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.is_success());
        // Rendering uses the canonical allowlist casing.
        assert!(result.shell.as_ref().unwrap().command.starts_with("Get-Mailbox"));
    }

    #[tokio::test]
    async fn mailbox_records_are_capped() {
        let result = executor()
            .execute(
                &envelope(&[(X_PS_COMMAND, "Get-Mailbox"), (X_PS_MAX_RESULTS, "2")]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let shell = result.shell.as_ref().unwrap();
        assert_eq!(shell.objects.len(), 2);
        assert_eq!(shell.objects[0]["MailboxType"], "UserMailbox");
        assert!(shell.objects[0]["DisplayName"].is_string());
    }

    #[tokio::test]
    async fn default_options_render_result_size_100() {
        let result = executor()
            .execute(&envelope(&[(X_PS_COMMAND, "Get-Mailbox")]), CancellationToken::new())
            .await
            .unwrap();
        let shell = result.shell.as_ref().unwrap();
        assert_eq!(shell.command, "Get-Mailbox -ResultSize 100");
        assert_eq!(shell.objects.len(), 5);
        assert_eq!(shell.stdout.last().map(String::as_str), Some("Simulated output"));
    }

    #[tokio::test]
    async fn filter_is_rendered_when_present() {
        let result = executor()
            .execute(
                &envelope(&[
                    (X_PS_COMMAND, "Get-User"),
                    (X_PS_FILTER, "Department -eq 'Sales'"),
                    (X_PS_RESULT_SIZE, "25"),
                ]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let shell = result.shell.as_ref().unwrap();
        assert_eq!(
            shell.command,
            "Get-User -Filter \"Department -eq 'Sales'\" -ResultSize 25"
        );
        assert_eq!(shell.objects.len(), 3);
        assert_eq!(shell.objects[0]["Department"], "Engineering");
    }

    #[tokio::test]
    async fn other_allowlisted_commands_echo_their_arguments() {
        let result = executor()
            .execute(
                &envelope(&[(X_PS_COMMAND, "Get-DistributionGroup")]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let shell = result.shell.as_ref().unwrap();
        assert!(shell.stdout.iter().any(|line| line.contains("Get-DistributionGroup")));
        assert!(shell.objects.is_empty());
        assert_eq!(shell.stdout.last().map(String::as_str), Some("Simulated output"));
    }

    #[tokio::test]
    async fn cancellation_during_session_is_a_transient_timeout() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor()
            .execute(&envelope(&[(X_PS_COMMAND, "Get-Mailbox")]), cancel)
            .await
            .unwrap();
        assert_eq!(result.error_code(), Some(codes::TIMEOUT));
        assert!(result.is_transient());
    }

    #[test]
    fn failure_classification_matches_message_content() {
        assert!(is_transient_shell_failure("server Busy, try later"));
        assert!(is_transient_shell_failure("operation TIMEOUT"));
        assert!(is_transient_shell_failure("service unavailable"));
        assert!(!is_transient_shell_failure("access denied"));
    }
}
