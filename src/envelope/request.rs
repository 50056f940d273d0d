//! Inbound request envelope.
//!
//! # Responsibilities
//! - Carry the parsed inbound request through the pipeline
//! - Case-insensitive header and query lookups, original casing preserved
//! - Well-known gateway header names

use std::collections::{BTreeMap, HashMap};

/// Trace id header; generated when absent.
pub const X_REQUEST_ID: &str = "X-Request-Id";
/// Opaque cross-service id; echoed unchanged.
pub const X_CORRELATION_ID: &str = "X-Correlation-Id";
/// Executor selector: `http` (default) or `shell`.
pub const X_EXECUTOR_TYPE: &str = "X-Executor-Type";
/// Absolute base URL for the HTTP executor.
pub const X_FORWARD_BASE: &str = "X-Forward-Base";
/// Allowlisted command name for the shell executor.
pub const X_PS_COMMAND: &str = "X-PS-Command";
/// Optional filter expression for the shell executor.
pub const X_PS_FILTER: &str = "X-PS-Filter";
/// Result-size argument rendered into the command line.
pub const X_PS_RESULT_SIZE: &str = "X-PS-ResultSize";
/// Cap on generated records.
pub const X_PS_MAX_RESULTS: &str = "X-PS-MaxResults";

/// HTTP methods the gateway accepts.
pub const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Methods whose body is forwarded downstream.
pub const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// String map with case-insensitive keys.
///
/// Lookups fold the key to lowercase; the original casing of the last
/// writer is kept so forwarded headers keep their inbound spelling.
/// Duplicate keys are last-writer-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseInsensitiveMap {
    entries: HashMap<String, (String, String)>,
}

impl CaseInsensitiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair, replacing any entry with the same
    /// case-folded key.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(original_name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Copy into an ordered map keyed by original names.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter().map(|(name, value)| (name.to_string(), value.to_string())).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CaseInsensitiveMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Immutable description of the inbound request.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// Non-empty opaque trace id.
    pub request_id: String,
    /// Opaque cross-service id, echoed unchanged.
    pub correlation_id: Option<String>,
    /// Uppercased HTTP method.
    pub method: String,
    /// URL-decoded path, possibly empty.
    pub path: String,
    /// Query parameters, case-insensitive, last-writer-wins.
    pub query: CaseInsensitiveMap,
    /// Inbound headers, case-insensitive lookups.
    pub headers: CaseInsensitiveMap,
    /// Body text, present only for body-bearing or JSON requests.
    pub body: Option<String>,
}

impl RequestEnvelope {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The `X-Executor-Type` header value, if present.
    pub fn executor_type(&self) -> Option<&str> {
        self.header(X_EXECUTOR_TYPE)
    }

    /// Whether the method carries a request body downstream.
    pub fn has_body_method(&self) -> bool {
        BODY_METHODS.contains(&self.method.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_with_headers(pairs: &[(&str, &str)]) -> RequestEnvelope {
        RequestEnvelope {
            request_id: "req-1".to_string(),
            correlation_id: None,
            method: "GET".to_string(),
            path: String::new(),
            query: CaseInsensitiveMap::new(),
            headers: pairs.iter().cloned().collect(),
            body: None,
        }
    }

    #[test]
    fn lookups_ignore_case() {
        let map: CaseInsensitiveMap = [("X-Forward-Base", "http://a")].into_iter().collect();
        assert_eq!(map.get("x-forward-base"), Some("http://a"));
        assert_eq!(map.get("X-FORWARD-BASE"), Some("http://a"));
        assert!(map.contains("X-Forward-Base"));
    }

    #[test]
    fn duplicate_keys_are_last_writer_wins() {
        let mut map = CaseInsensitiveMap::new();
        map.insert("Accept", "text/plain");
        map.insert("accept", "application/json");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("ACCEPT"), Some("application/json"));
        // Last writer's casing is what gets forwarded.
        assert_eq!(map.iter().next().unwrap().0, "accept");
    }

    #[test]
    fn envelope_header_helpers() {
        let envelope = envelope_with_headers(&[("x-executor-type", "SHELL")]);
        assert_eq!(envelope.executor_type(), Some("SHELL"));
        assert!(!envelope.has_body_method());
    }
}
