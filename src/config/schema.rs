//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::csrf::MAX_TOKENS_PER_SESSION;
use crate::security::failures::{FAILURE_THRESHOLD, FAILURE_WINDOW};
use crate::security::session::DEFAULT_SESSION_COOKIES;

/// Root configuration for the guard server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request gate policy.
    pub gate: GateConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Failure tracker window and threshold.
    pub failures: FailureConfig,

    /// Security response headers.
    pub headers: HeadersConfig,

    /// Credentials for the built-in authenticator.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Request gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path prefixes that require a session.
    pub protected_prefixes: Vec<String>,

    /// Path prefixes served as static assets (never challenged).
    pub static_prefixes: Vec<String>,

    /// File extensions served as static assets.
    pub static_extensions: Vec<String>,

    /// Authentication endpoints (never challenged).
    pub auth_prefixes: Vec<String>,

    /// Where unauthenticated requests are redirected.
    pub signin_path: String,

    /// Cookie names that carry a session, in priority order.
    pub session_cookie_names: Vec<String>,

    /// Case-insensitive user-agent substrings rejected outright.
    pub blocked_user_agents: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: strings(&["/admin", "/api/admin"]),
            static_prefixes: strings(&["/_next/", "/static/", "/favicon.ico"]),
            static_extensions: strings(&[
                "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2",
                "map",
            ]),
            auth_prefixes: strings(&["/api/auth/"]),
            signin_path: "/auth/signin".to_string(),
            session_cookie_names: strings(&DEFAULT_SESSION_COOKIES),
            blocked_user_agents: strings(&[
                "sqlmap", "nikto", "nmap", "masscan", "nessus", "openvas", "acunetix", "w3af",
                "dirbuster", "gobuster", "wpscan", "zgrab", "nuclei",
            ]),
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Tokens kept per session before the oldest is evicted.
    pub max_tokens_per_session: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_session: MAX_TOKENS_PER_SESSION,
        }
    }
}

/// Failure tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FailureConfig {
    /// Sliding window in seconds.
    pub window_secs: u64,

    /// Failures inside the window that flag an identifier.
    pub threshold: usize,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            window_secs: FAILURE_WINDOW.as_secs(),
            threshold: FAILURE_THRESHOLD,
        }
    }
}

/// Security response header configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Attach security headers to every response.
    pub enabled: bool,

    /// Content-Security-Policy value.
    pub content_security_policy: String,

    /// Strict-Transport-Security max-age in seconds.
    pub hsts_max_age_secs: u64,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_security_policy: [
                "default-src 'self'",
                "script-src 'self' 'unsafe-inline' 'unsafe-eval' https://vercel.live",
                "style-src 'self' 'unsafe-inline' https://fonts.googleapis.com",
                "font-src 'self' https://fonts.gstatic.com",
                "img-src 'self' data: blob: https://*.supabase.co",
                "connect-src 'self' https://*.supabase.co",
                "frame-ancestors 'none'",
            ]
            .join("; "),
            // Two years
            hsts_max_age_secs: 63_072_000,
        }
    }
}

/// Built-in authenticator credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request size limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes (also bounds CSRF body buffering).
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: GuardConfig = toml::from_str("").unwrap();
        assert_eq!(config.failures.window_secs, 900);
        assert_eq!(config.failures.threshold, 5);
        assert_eq!(config.csrf.max_tokens_per_session, MAX_TOKENS_PER_SESSION);
        assert_eq!(config.gate.session_cookie_names.len(), 3);
        assert_eq!(config.headers.hsts_max_age_secs, 2 * 365 * 24 * 60 * 60);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: GuardConfig = toml::from_str(
            r#"
            [gate]
            protected_prefixes = ["/dashboard"]

            [failures]
            threshold = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.gate.protected_prefixes, vec!["/dashboard".to_string()]);
        assert_eq!(config.gate.signin_path, "/auth/signin");
        assert_eq!(config.failures.threshold, 3);
        assert_eq!(config.failures.window_secs, 900);
    }
}
