//! Security response headers.
//!
//! # Responsibilities
//! - Build the fixed header set attached to every response
//!   (nosniff, frame deny, referrer policy, CSP, HSTS)
//!
//! # Design Decisions
//! - Headers override whatever a handler set
//! - Applied outside the gate so rejections and redirects carry them too

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::schema::HeadersConfig;

/// The header set for `config`. Values that are not valid header text are
/// skipped with an error log; validation rejects them before this point.
pub fn security_headers(config: &HeadersConfig) -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = vec![
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ),
    ];

    match HeaderValue::from_str(&config.content_security_policy) {
        Ok(value) => headers.push((header::CONTENT_SECURITY_POLICY, value)),
        Err(_) => tracing::error!("Content-Security-Policy is not a valid header value; skipped"),
    }

    let hsts = format!(
        "max-age={}; includeSubDomains; preload",
        config.hsts_max_age_secs
    );
    if let Ok(value) = HeaderValue::from_str(&hsts) {
        headers.push((header::STRICT_TRANSPORT_SECURITY, value));
    }

    headers
}

/// Wrap `router` so every response carries the security headers.
pub fn apply<S>(router: Router<S>, config: &HeadersConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if !config.enabled {
        return router;
    }
    security_headers(config)
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(name, value))
        })
}
