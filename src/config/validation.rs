//! Configuration validation logic.

use crate::config::schema::GatewayConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a GatewayConfig for semantic correctness.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError("retry.max_attempts must be > 0".to_string()));
    }
    if config.retry.base_delay_ms == 0 {
        errors.push(ValidationError("retry.base_delay_ms must be > 0".to_string()));
    }
    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        errors.push(ValidationError(
            "retry.max_delay_ms must be >= retry.base_delay_ms".to_string(),
        ));
    }
    if config.retry.per_attempt_timeout_ms == 0 {
        errors.push(ValidationError("retry.per_attempt_timeout_ms must be > 0".to_string()));
    }
    if !(0.0..=1.0).contains(&config.retry.jitter_fraction) {
        errors.push(ValidationError(
            "retry.jitter_fraction must be between 0.0 and 1.0".to_string(),
        ));
    }

    if config.service.max_request_body_kb == 0 {
        errors.push(ValidationError("service.max_request_body_kb must be > 0".to_string()));
    }
    if config.http.max_response_body_kb == 0 {
        errors.push(ValidationError("http.max_response_body_kb must be > 0".to_string()));
    }
    if config.http.default_timeout_sec == 0 {
        errors.push(ValidationError("http.default_timeout_sec must be > 0".to_string()));
    }

    if config.shell.allowed_commands.is_empty() {
        errors.push(ValidationError("shell.allowed_commands must not be empty".to_string()));
    }

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "listener.bind_address {:?} is not a valid socket address",
            config.listener.bind_address
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = GatewayConfig::default();
        config.retry.max_attempts = 0;
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("max_attempts")));
    }

    #[test]
    fn jitter_fraction_out_of_range_rejected() {
        let mut config = GatewayConfig::default();
        config.retry.jitter_fraction = 1.5;
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("jitter_fraction")));
    }

    #[test]
    fn empty_allowlist_rejected() {
        let mut config = GatewayConfig::default();
        config.shell.allowed_commands.clear();
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("allowed_commands")));
    }

    #[test]
    fn bad_bind_address_rejected() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("bind_address")));
    }
}
