//! Per-request dispatch pipeline.
//!
//! Builds the envelope from the raw inbound request, validates it, selects
//! an executor, drives the retry loop, and writes the response envelope
//! with traceability headers.

use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::dispatch::validator::Validation;
use crate::envelope::request::{CaseInsensitiveMap, RequestEnvelope};
use crate::envelope::response::{ErrorBody, ResponseEnvelope};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Catch-all dispatch handler for `/api` and `/api/{*path}`.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();

    // Trace identity first so every rejection can echo it.
    let request_id = header_value(&parts.headers, "x-request-id")
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let correlation_id = header_value(&parts.headers, "x-correlation-id");

    let max_body_bytes = state.config.service.max_body_bytes();

    // Early rejection on the declared length, before touching the body.
    if let Some(length) = header_value(&parts.headers, CONTENT_LENGTH.as_str())
        .and_then(|value| value.trim().parse::<usize>().ok())
    {
        if length > max_body_bytes {
            state.metrics.increment(metrics::INVALID);
            return invalid_request(&state, &request_id, state.validator.body_too_large_message());
        }
    }

    // Read the body only when the method carries one or the payload is
    // JSON; the read itself is capped, so an unsized stream cannot exceed
    // the limit either.
    let method = parts.method.as_str().to_ascii_uppercase();
    let is_json = header_value(&parts.headers, CONTENT_TYPE.as_str())
        .map(|value| value.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);
    let body = if matches!(method.as_str(), "POST" | "PUT" | "PATCH") || is_json {
        match to_bytes(body, max_body_bytes).await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => {
                state.metrics.increment(metrics::INVALID);
                return invalid_request(
                    &state,
                    &request_id,
                    state.validator.body_too_large_message(),
                );
            }
        }
    } else {
        None
    };

    // Envelope construction: decode the path once; a decoded slash is
    // path content, not a new segment.
    let sub_path = parts
        .uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(parts.uri.path())
        .trim_start_matches('/');
    let path = percent_decode_str(sub_path).decode_utf8_lossy().into_owned();

    let mut query = CaseInsensitiveMap::new();
    if let Some(raw) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            query.insert(key.into_owned(), value.into_owned());
        }
    }

    let mut headers = CaseInsensitiveMap::new();
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str(), value);
        }
    }

    let envelope = RequestEnvelope {
        request_id: request_id.clone(),
        correlation_id: correlation_id.clone(),
        method,
        path,
        query,
        headers,
        body,
    };

    if let Validation::Invalid { code, message } = state.validator.validate(Some(&envelope)) {
        tracing::debug!(
            request_id = %request_id,
            code = code.as_str(),
            "Request rejected by validation"
        );
        state.metrics.increment(metrics::INVALID);
        return invalid_request(&state, &request_id, format!("{}: {}", code.as_str(), message));
    }

    // Executor selection, defaulting to http.
    let executor_name = envelope.executor_type().unwrap_or("http").to_string();
    let Some(executor) = state.registry.get(&executor_name) else {
        tracing::debug!(
            request_id = %request_id,
            executor = %executor_name,
            "Unknown executor type"
        );
        state.metrics.increment(metrics::BAD_EXECUTOR);
        return error_response(
            &state,
            &request_id,
            "UnsupportedExecutor",
            format!(
                "unsupported executor type {:?}; known executors: {}",
                executor_name,
                state.registry.names().join(", ")
            ),
        );
    };

    // Retry loop; the per-request token is a child of the process root
    // so shutdown cancels in-flight work.
    let outer = state.root_cancel.child_token();
    let envelope_ref = &envelope;
    let outcome = state
        .retry
        .run(&request_id, &outer, |_, cancel| {
            let executor = executor.clone();
            async move { executor.execute(envelope_ref, cancel).await }
        })
        .await;

    // Metrics on the terminal outcome.
    state.metrics.increment(metrics::TOTAL);
    if outcome.overall_success() {
        state.metrics.increment(metrics::SUCCESS);
    } else {
        state.metrics.increment(metrics::FAILED);
    }
    if outcome.attempt_count() > 1 {
        state.metrics.increment(metrics::RETRIED);
    }
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    state.metrics.record_latency(elapsed_ms);

    tracing::info!(
        request_id = %request_id,
        executor = executor.name(),
        attempts = outcome.attempt_count(),
        success = outcome.overall_success(),
        elapsed_ms,
        "Dispatch complete"
    );

    // Response envelope. The outer status is the downstream status only
    // when the HTTP executor succeeded; every other processed request is a
    // 200, including executor-level failures.
    let response_envelope = ResponseEnvelope::build(
        request_id.clone(),
        correlation_id.clone(),
        executor.name(),
        &outcome,
    );
    let status = match outcome.last().http.as_ref() {
        Some(http) if outcome.overall_success() => {
            StatusCode::from_u16(http.status_code).unwrap_or(StatusCode::OK)
        }
        _ => StatusCode::OK,
    };

    let mut response = (status, Json(&response_envelope)).into_response();
    let response_headers = response.headers_mut();
    set_header(response_headers, "x-request-id", &request_id);
    if let Some(correlation_id) = &correlation_id {
        set_header(response_headers, "x-correlation-id", correlation_id);
    }
    set_header(response_headers, "x-instance-id", &state.config.service.instance_id);
    set_header(response_headers, "x-executor", executor.name());
    set_header(response_headers, "x-attempts", &outcome.attempt_count().to_string());
    response
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

fn invalid_request(state: &AppState, request_id: &str, message: String) -> Response {
    error_response(state, request_id, "InvalidRequest", message)
}

/// HTTP 400 with the structured pre-dispatch error body.
fn error_response(state: &AppState, request_id: &str, code: &str, message: String) -> Response {
    let body = ErrorBody {
        code: code.to_string(),
        message,
        request_id: request_id.to_string(),
        timestamp: state.clock.now(),
    };
    let mut response = (StatusCode::BAD_REQUEST, Json(body)).into_response();
    set_header(response.headers_mut(), "x-request-id", request_id);
    response
}
