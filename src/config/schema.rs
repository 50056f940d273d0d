//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from config
//! files; every field has a default so a minimal (or absent) file is
//! usable.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service identity and request-size limits.
    pub service: ServiceConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Retry policy applied around every executor invocation.
    pub retry: RetryConfig,

    /// Outbound HTTP forwarding settings.
    pub http: HttpForwardConfig,

    /// Remote-shell executor settings.
    pub shell: ShellConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Instance identifier returned in `X-Instance-Id` and `/metrics`.
    pub instance_id: String,

    /// Maximum inbound request body size in KB.
    pub max_request_body_kb: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_id: "remote-executor-01".to_string(),
            max_request_body_kb: 1000,
        }
    }
}

impl ServiceConfig {
    /// The single body-size limit in bytes; both the Content-Length check
    /// and the streaming read cap derive from it.
    pub fn max_body_bytes(&self) -> usize {
        self.max_request_body_kb * 1024
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Additive jitter as a fraction of the capped delay, in [0, 1].
    pub jitter_fraction: f64,

    /// Deadline for a single attempt in milliseconds.
    pub per_attempt_timeout_ms: u64,

    /// Downstream HTTP status codes classified as transient.
    pub transient_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
            jitter_fraction: 0.25,
            per_attempt_timeout_ms: 10_000,
            transient_status_codes: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

/// Outbound HTTP forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpForwardConfig {
    /// Maximum downstream response body size retained, in KB. Longer
    /// bodies are truncated with a marker.
    pub max_response_body_kb: usize,

    /// Transport timeout for outbound calls in seconds. The effective
    /// timeout is never below the per-attempt deadline.
    pub default_timeout_sec: u64,

    /// Header names never forwarded downstream (case-insensitive).
    pub filtered_headers: Vec<String>,
}

impl Default for HttpForwardConfig {
    fn default() -> Self {
        Self {
            max_response_body_kb: 512,
            default_timeout_sec: 15,
            filtered_headers: vec![
                "Authorization".to_string(),
                "Proxy-Authorization".to_string(),
                "Cookie".to_string(),
            ],
        }
    }
}

impl HttpForwardConfig {
    pub fn max_response_body_bytes(&self) -> usize {
        self.max_response_body_kb * 1024
    }
}

/// Remote-shell executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Commands the shell executor will run (case-insensitive exact
    /// match).
    pub allowed_commands: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            allowed_commands: vec![
                "Get-Mailbox".to_string(),
                "Get-User".to_string(),
                "Get-DistributionGroup".to_string(),
            ],
        }
    }
}
