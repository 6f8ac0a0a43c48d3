//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, threshold > 0, token bound > 0)
//! - Check path shapes (absolute sign-in path, `/`-rooted prefixes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("failures.window_secs must be greater than zero")]
    ZeroWindow,
    #[error("failures.threshold must be greater than zero")]
    ZeroThreshold,
    #[error("csrf.max_tokens_per_session must be greater than zero")]
    ZeroTokenBound,
    #[error("gate.signin_path `{0}` must start with `/`")]
    SigninPath(String),
    #[error("gate.session_cookie_names must not be empty")]
    NoSessionCookies,
    #[error("gate prefix `{0}` must start with `/`")]
    Prefix(String),
    #[error("gate.signin_path `{0}` is itself protected")]
    SigninProtected(String),
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,
    #[error("headers.content_security_policy is not a valid header value")]
    ContentSecurityPolicy,
}

/// Check a parsed configuration, collecting every error.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.failures.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.failures.threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }
    if config.csrf.max_tokens_per_session == 0 {
        errors.push(ValidationError::ZeroTokenBound);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if HeaderValue::from_str(&config.headers.content_security_policy).is_err() {
        errors.push(ValidationError::ContentSecurityPolicy);
    }

    let gate = &config.gate;
    if !gate.signin_path.starts_with('/') {
        errors.push(ValidationError::SigninPath(gate.signin_path.clone()));
    }
    if gate.session_cookie_names.iter().all(|n| n.trim().is_empty()) {
        errors.push(ValidationError::NoSessionCookies);
    }
    for prefix in gate
        .protected_prefixes
        .iter()
        .chain(&gate.static_prefixes)
        .chain(&gate.auth_prefixes)
    {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::Prefix(prefix.clone()));
        }
    }
    if gate
        .protected_prefixes
        .iter()
        .any(|p| gate.signin_path.starts_with(p.as_str()))
    {
        // The challenge would redirect into itself.
        errors.push(ValidationError::SigninProtected(gate.signin_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
