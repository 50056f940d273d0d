//! HTTP-forwarding executor.
//!
//! # Responsibilities
//! - Resolve the target URL from `X-Forward-Base` plus the envelope path
//!   and query
//! - Forward safe headers and the JSON body downstream
//! - Map status codes, network errors, and cancellation into the
//!   execution-result taxonomy
//! - Bound the retained response body, marking truncation
//!
//! # Design Decisions
//! - One long-lived client shared across requests for connection reuse;
//!   transport decompression stays on
//! - The transport timeout never undercuts the per-attempt deadline, so
//!   the retry controller owns timing
//! - Sensitive query values are masked in logs only; the outbound request
//!   keeps the originals

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::clock::Clock;
use crate::config::schema::{HttpForwardConfig, RetryConfig};
use crate::envelope::request::{RequestEnvelope, X_FORWARD_BASE};
use crate::executor::result::{codes, ExecutionResult, ExecutionStatus, HttpOutcome};
use crate::executor::{Executor, ExecutorError};

/// Query keys whose values are masked in log output.
const MASKED_QUERY_KEYS: [&str; 6] = ["api_key", "apikey", "token", "secret", "password", "pwd"];

/// Marker appended to truncated response bodies.
fn truncation_marker(original: usize, max: usize) -> String {
    format!("...[truncated from {} to {} bytes]", original, max)
}

/// Headers never forwarded regardless of configuration. Hop-by-hop fields
/// are re-derived by the outbound client.
const HOP_BY_HOP: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Forwards the envelope as an outbound HTTP call.
pub struct HttpExecutor {
    client: reqwest::Client,
    config: HttpForwardConfig,
    transient_status_codes: Vec<u16>,
    clock: Arc<dyn Clock>,
}

impl HttpExecutor {
    /// Build the executor and its shared client.
    pub fn new(
        config: HttpForwardConfig,
        retry: &RetryConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let transport_timeout = Duration::from_millis(
            (config.default_timeout_sec * 1000).max(retry.per_attempt_timeout_ms),
        );
        let client = reqwest::Client::builder()
            .gzip(true)
            .timeout(transport_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            transient_status_codes: retry.transient_status_codes.clone(),
            clock,
        })
    }

    fn forward_headers(&self, envelope: &RequestEnvelope) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in envelope.headers.iter() {
            if !should_forward_header(name, &self.config.filtered_headers) {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => {
                    tracing::debug!(header = %name, "Skipping unrepresentable header");
                }
            }
        }
        headers
    }
}

impl Executor for HttpExecutor {
    fn name(&self) -> &str {
        "http"
    }

    fn execute<'a>(
        &'a self,
        envelope: &'a RequestEnvelope,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ExecutionResult, ExecutorError>> {
        Box::pin(async move {
            let started_at = self.clock.now();

            let Some(base) = envelope.header(X_FORWARD_BASE) else {
                return Ok(ExecutionResult::failure(
                    codes::BAD_CONFIGURATION,
                    format!("required header {} is missing", X_FORWARD_BASE),
                    false,
                    started_at,
                    self.clock.now(),
                ));
            };

            let target = match build_target_url(base, envelope) {
                Ok(url) => url,
                Err(message) => {
                    return Ok(ExecutionResult::failure(
                        codes::INVALID_URI,
                        message,
                        false,
                        started_at,
                        self.clock.now(),
                    ));
                }
            };

            tracing::debug!(
                request_id = %envelope.request_id,
                target = %masked_url(&target),
                method = %envelope.method,
                "Forwarding request"
            );

            let method = reqwest::Method::from_bytes(envelope.method.as_bytes())
                .map_err(|_| ExecutorError::Internal(format!("method {:?}", envelope.method)))?;

            let mut headers = self.forward_headers(envelope);
            let mut request = self.client.request(method, target);
            if envelope.has_body_method() {
                if let Some(body) = envelope.body.as_ref().filter(|body| !body.is_empty()) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/json; charset=utf-8"),
                    );
                    request = request.body(body.clone());
                }
            }
            let request = request.headers(headers);

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok(ExecutionResult::timeout(started_at, self.clock.now()));
                }
                sent = request.send() => match sent {
                    Ok(response) => response,
                    Err(error) => {
                        return Ok(classify_send_error(&error, started_at, self.clock.now()));
                    }
                },
            };

            let status = response.status().as_u16();
            let headers = collect_response_headers(response.headers());

            let body = tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok(ExecutionResult::timeout(started_at, self.clock.now()));
                }
                read = response.text() => match read {
                    Ok(text) => text,
                    Err(error) => {
                        return Ok(ExecutionResult::failure(
                            codes::NETWORK_ERROR,
                            format!("failed to read response body: {}", error),
                            true,
                            started_at,
                            self.clock.now(),
                        ));
                    }
                },
            };

            let body = truncate_body(body, self.config.max_response_body_bytes());
            let outcome = HttpOutcome {
                status_code: status,
                headers,
                body,
            };
            let completed_at = self.clock.now();

            match classify_status(status, &self.transient_status_codes) {
                ExecutionStatus::Success => {
                    Ok(ExecutionResult::http_success(started_at, completed_at, outcome))
                }
                classified => Ok(ExecutionResult::http_failure(
                    codes::HTTP_STATUS,
                    format!("downstream returned status {}", status),
                    classified == ExecutionStatus::TransientFailure,
                    outcome,
                    started_at,
                    completed_at,
                )),
            }
        })
    }
}

/// Resolve the outbound URL: base path joined with the envelope path,
/// base query merged with the envelope query (envelope wins).
fn build_target_url(base: &str, envelope: &RequestEnvelope) -> Result<Url, String> {
    let base_url = Url::parse(base).map_err(|error| format!("invalid forward base {:?}: {}", base, error))?;
    if !base_url.has_host() {
        return Err(format!("forward base {:?} has no host", base));
    }

    let mut url = base_url.clone();
    let joined = format!(
        "{}/{}",
        base_url.path().trim_end_matches('/'),
        envelope.path.trim_start_matches('/')
    );
    url.set_path(&joined);

    let merged = merge_query(&base_url, envelope);
    url.set_query(None);
    if !merged.is_empty() {
        url.query_pairs_mut().extend_pairs(merged);
    }

    Ok(url)
}

fn merge_query(base: &Url, envelope: &RequestEnvelope) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| !envelope.query.contains(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    for (key, value) in envelope.query.iter() {
        merged.push((key.to_string(), value.to_string()));
    }
    merged
}

/// Classify a downstream status: 2xx succeeds, the configured set is
/// transient, everything else is permanent. Pure in the status code for a
/// fixed set.
fn classify_status(status: u16, transient: &[u16]) -> ExecutionStatus {
    if (200..300).contains(&status) {
        ExecutionStatus::Success
    } else if transient.contains(&status) {
        ExecutionStatus::TransientFailure
    } else {
        ExecutionStatus::PermanentFailure
    }
}

/// Deny-list plus prefix rules; all matching is case-insensitive.
fn should_forward_header(name: &str, filtered: &[String]) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower == "host" || lower.starts_with("x-") || lower.starts_with("sec-") {
        return false;
    }
    if HOP_BY_HOP.contains(&lower.as_str()) {
        return false;
    }
    !filtered.iter().any(|denied| denied.eq_ignore_ascii_case(name))
}

fn collect_response_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(";");
        collected.insert(name.as_str().to_string(), joined);
    }
    collected
}

fn classify_send_error(
    error: &reqwest::Error,
    started_at: chrono::DateTime<chrono::Utc>,
    completed_at: chrono::DateTime<chrono::Utc>,
) -> ExecutionResult {
    if error.is_builder() {
        return ExecutionResult::failure(
            codes::INVALID_URI,
            format!("outbound URI rejected: {}", error),
            false,
            started_at,
            completed_at,
        );
    }
    if error.is_timeout() {
        return ExecutionResult::failure(
            codes::TIMEOUT,
            format!("outbound call timed out: {}", error),
            true,
            started_at,
            completed_at,
        );
    }
    ExecutionResult::failure(
        codes::NETWORK_ERROR,
        format!("outbound call failed: {}", error),
        true,
        started_at,
        completed_at,
    )
}

/// Bound the retained body, appending the truncation marker when the
/// source exceeded the cap. Truncation lands on a char boundary so the
/// retained prefix stays valid UTF-8; the marker reports byte counts.
fn truncate_body(body: String, max_bytes: usize) -> String {
    if body.len() <= max_bytes {
        return body;
    }
    let original = body.len();
    let mut cut = max_bytes;
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = body[..cut].to_string();
    truncated.push_str(&truncation_marker(original, max_bytes));
    truncated
}

/// Render a URL for logging with sensitive query values replaced.
fn masked_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            if MASKED_QUERY_KEYS.iter().any(|sensitive| key.eq_ignore_ascii_case(sensitive)) {
                (key.into_owned(), "***MASKED***".to_string())
            } else {
                (key.into_owned(), value.into_owned())
            }
        })
        .collect();
    masked.set_query(None);
    if !pairs.is_empty() {
        masked.query_pairs_mut().extend_pairs(pairs);
    }
    masked.to_string()
}
