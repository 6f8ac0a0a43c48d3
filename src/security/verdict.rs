//! Outcome of a validation call.

use serde::Serialize;

/// Per-call validation result. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub is_valid: bool,
    /// Human-readable reason when the input was refused.
    pub message: Option<String>,
    /// Value safe to hand to persistence; only set when valid.
    pub sanitized: Option<String>,
}

impl Verdict {
    pub fn valid(sanitized: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: None,
            sanitized: Some(sanitized.into()),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            sanitized: None,
        }
    }
}
