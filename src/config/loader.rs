//! Configuration loading from disk and the environment.
//!
//! Precedence is environment over file over built-in defaults. Environment
//! keys use a double underscore as the path separator, e.g.
//! `RETRY__MAX_ATTEMPTS=5` overrides `retry.max_attempts`. List values are
//! comma-separated.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    EnvOverride { key: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::EnvOverride { key, value } => {
                write!(f, "Invalid environment override {}={:?}", key, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: optional TOML file, then environment overrides,
/// then semantic validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides from the given lookup. Split out from
/// [`load_config`] so tests can drive it without mutating the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    set_string(&lookup, "SERVICE__INSTANCE_ID", &mut config.service.instance_id);
    set_parsed(&lookup, "SERVICE__MAX_REQUEST_BODY_KB", &mut config.service.max_request_body_kb)?;
    set_string(&lookup, "LISTENER__BIND_ADDRESS", &mut config.listener.bind_address);

    set_parsed(&lookup, "RETRY__MAX_ATTEMPTS", &mut config.retry.max_attempts)?;
    set_parsed(&lookup, "RETRY__BASE_DELAY_MS", &mut config.retry.base_delay_ms)?;
    set_parsed(&lookup, "RETRY__MAX_DELAY_MS", &mut config.retry.max_delay_ms)?;
    set_parsed(&lookup, "RETRY__JITTER_FRACTION", &mut config.retry.jitter_fraction)?;
    set_parsed(
        &lookup,
        "RETRY__PER_ATTEMPT_TIMEOUT_MS",
        &mut config.retry.per_attempt_timeout_ms,
    )?;
    set_list(
        &lookup,
        "RETRY__TRANSIENT_STATUS_CODES",
        &mut config.retry.transient_status_codes,
    )?;

    set_parsed(&lookup, "HTTP__MAX_RESPONSE_BODY_KB", &mut config.http.max_response_body_kb)?;
    set_parsed(&lookup, "HTTP__DEFAULT_TIMEOUT_SEC", &mut config.http.default_timeout_sec)?;
    set_string_list(&lookup, "HTTP__FILTERED_HEADERS", &mut config.http.filtered_headers);

    set_string_list(&lookup, "SHELL__ALLOWED_COMMANDS", &mut config.shell.allowed_commands);

    Ok(())
}

fn set_string<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, target: &mut String) {
    if let Some(value) = lookup(key) {
        *target = value;
    }
}

fn set_string_list<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, target: &mut Vec<String>) {
    if let Some(value) = lookup(key) {
        *target = value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
    }
}

fn set_parsed<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *target = value.trim().parse().map_err(|_| ConfigError::EnvOverride {
            key: key.to_string(),
            value,
        })?;
    }
    Ok(())
}

fn set_list<T, F>(lookup: &F, key: &str, target: &mut Vec<T>) -> Result<(), ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        let mut parsed = Vec::new();
        for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            parsed.push(item.parse().map_err(|_| ConfigError::EnvOverride {
                key: key.to_string(),
                value: value.clone(),
            })?);
        }
        *target = parsed;
    }
    Ok(())
}
