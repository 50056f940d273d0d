//! Structural validation of the request envelope.
//!
//! Rules run in a fixed order and the first failure wins, so every
//! rejection carries exactly one code from the closed set.

use crate::envelope::request::{
    RequestEnvelope, ALLOWED_METHODS, X_EXECUTOR_TYPE, X_FORWARD_BASE, X_PS_COMMAND,
};

/// Closed set of validation failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    NullRequest,
    MissingRequestId,
    MissingPsCommand,
    MissingForwardBase,
    BodyTooLarge,
    InvalidHttpMethod,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::NullRequest => "NullRequest",
            ValidationCode::MissingRequestId => "MissingRequestId",
            ValidationCode::MissingPsCommand => "MissingPsCommand",
            ValidationCode::MissingForwardBase => "MissingForwardBase",
            ValidationCode::BodyTooLarge => "BodyTooLarge",
            ValidationCode::InvalidHttpMethod => "InvalidHttpMethod",
        }
    }
}

/// Tagged validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid {
        code: ValidationCode,
        message: String,
    },
}

impl Validation {
    fn invalid(code: ValidationCode, message: impl Into<String>) -> Self {
        Validation::Invalid {
            code,
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Structural and size checks on the envelope. Read-only after boot.
#[derive(Debug, Clone)]
pub struct Validator {
    max_body_bytes: usize,
    max_request_body_kb: usize,
}

impl Validator {
    pub fn new(max_request_body_kb: usize) -> Self {
        Self {
            max_body_bytes: max_request_body_kb * 1024,
            max_request_body_kb,
        }
    }

    /// Message used for both body-size rules; states the limit in KB.
    pub fn body_too_large_message(&self) -> String {
        format!(
            "request body exceeds the maximum size of {} KB",
            self.max_request_body_kb
        )
    }

    /// Run the rule chain. `None` models the absent-request edge and maps
    /// to `NullRequest`; the dispatch path always passes `Some`.
    pub fn validate(&self, envelope: Option<&RequestEnvelope>) -> Validation {
        // 1. Envelope present.
        let Some(envelope) = envelope else {
            return Validation::invalid(ValidationCode::NullRequest, "request envelope is missing");
        };

        // 2. Request id non-empty.
        if envelope.request_id.is_empty() {
            return Validation::invalid(ValidationCode::MissingRequestId, "request_id is empty");
        }

        // 3./4. Executor-specific required headers. These fire only when
        // the executor-type header is literally present: an absent header
        // falls through and the defaulted executor reports the missing
        // base itself.
        match envelope.header(X_EXECUTOR_TYPE) {
            Some(value) if value.eq_ignore_ascii_case("shell") => {
                if envelope.header(X_PS_COMMAND).is_none() {
                    return Validation::invalid(
                        ValidationCode::MissingPsCommand,
                        format!("header {} is required for the shell executor", X_PS_COMMAND),
                    );
                }
            }
            Some(value) if value.eq_ignore_ascii_case("http") => {
                if envelope.header(X_FORWARD_BASE).is_none() {
                    return Validation::invalid(
                        ValidationCode::MissingForwardBase,
                        format!("header {} is required for the http executor", X_FORWARD_BASE),
                    );
                }
            }
            _ => {}
        }

        // 5. Declared content length within bounds.
        if let Some(length) = envelope
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<usize>().ok())
        {
            if length > self.max_body_bytes {
                return Validation::invalid(
                    ValidationCode::BodyTooLarge,
                    self.body_too_large_message(),
                );
            }
        }

        // 6. Actual body within bounds.
        if let Some(body) = &envelope.body {
            if body.len() > self.max_body_bytes {
                return Validation::invalid(
                    ValidationCode::BodyTooLarge,
                    self.body_too_large_message(),
                );
            }
        }

        // 7. Method in the allowed set.
        if !ALLOWED_METHODS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&envelope.method))
        {
            return Validation::invalid(
                ValidationCode::InvalidHttpMethod,
                format!("method {:?} is not supported", envelope.method),
            );
        }

        Validation::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::request::CaseInsensitiveMap;

    fn base_envelope() -> RequestEnvelope {
        RequestEnvelope {
            request_id: "req-1".to_string(),
            correlation_id: None,
            method: "GET".to_string(),
            path: "x".to_string(),
            query: CaseInsensitiveMap::new(),
            headers: CaseInsensitiveMap::new(),
            body: None,
        }
    }

    fn validator() -> Validator {
        Validator::new(1)
    }

    fn code(validation: Validation) -> ValidationCode {
        match validation {
            Validation::Invalid { code, .. } => code,
            Validation::Valid => panic!("expected invalid"),
        }
    }

    #[test]
    fn missing_envelope_is_null_request() {
        assert_eq!(code(validator().validate(None)), ValidationCode::NullRequest);
    }

    #[test]
    fn empty_request_id_rejected() {
        let mut envelope = base_envelope();
        envelope.request_id = String::new();
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::MissingRequestId
        );
    }

    #[test]
    fn shell_executor_requires_command_header() {
        let mut envelope = base_envelope();
        envelope.headers.insert("X-Executor-Type", "Shell");
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::MissingPsCommand
        );

        envelope.headers.insert("X-PS-Command", "Get-Mailbox");
        assert!(validator().validate(Some(&envelope)).is_valid());
    }

    #[test]
    fn http_executor_requires_forward_base_when_declared() {
        let mut envelope = base_envelope();
        envelope.headers.insert("x-executor-type", "http");
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::MissingForwardBase
        );
    }

    #[test]
    fn absent_executor_type_skips_header_rules() {
        // No executor-type header: neither rule 3 nor rule 4 fires and the
        // envelope reaches dispatch, where the defaulted http executor
        // reports the missing base as its own failure.
        let envelope = base_envelope();
        assert!(validator().validate(Some(&envelope)).is_valid());
    }

    #[test]
    fn declared_content_length_over_limit_rejected() {
        let mut envelope = base_envelope();
        envelope.headers.insert("Content-Length", "2048");
        let validation = validator().validate(Some(&envelope));
        assert_eq!(code(validation.clone()), ValidationCode::BodyTooLarge);
        if let Validation::Invalid { message, .. } = validation {
            assert!(message.contains("1 KB"));
        }
    }

    #[test]
    fn oversized_body_rejected() {
        let mut envelope = base_envelope();
        envelope.body = Some("x".repeat(2048));
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::BodyTooLarge
        );
    }

    #[test]
    fn unknown_method_rejected() {
        let mut envelope = base_envelope();
        envelope.method = "TRACE".to_string();
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::InvalidHttpMethod
        );
    }

    #[test]
    fn fixing_an_earlier_rule_advances_to_the_next() {
        // Monotonicity: satisfying rule k moves the failure forward.
        let mut envelope = base_envelope();
        envelope.request_id = String::new();
        envelope.headers.insert("X-Executor-Type", "shell");
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::MissingRequestId
        );

        envelope.request_id = "req-1".to_string();
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::MissingPsCommand
        );

        envelope.headers.insert("X-PS-Command", "Get-Mailbox");
        envelope.method = "TRACE".to_string();
        assert_eq!(
            code(validator().validate(Some(&envelope))),
            ValidationCode::InvalidHttpMethod
        );
    }
}
