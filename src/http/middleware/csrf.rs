//! Anti-forgery token enforcement for state-changing requests.
//!
//! # Responsibilities
//! - Find the token in `X-CSRF-Token`, else in the `_csrf` field of a JSON body
//! - Redeem it against the session the gate attached
//! - Reject with a JSON error and a `CSRF_VIOLATION` event otherwise
//!
//! # Design Decisions
//! - GET, HEAD and OPTIONS are never checked
//! - The body is buffered only when the header is absent, bounded by the
//!   configured body limit, and re-attached for the handler
//! - A body that is not JSON is a 400, every other failure a 403

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::request::client_ip;
use crate::http::server::AppState;
use crate::observability::events::{self, SecurityEventType};
use crate::security::session::SessionId;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_BODY_FIELD: &str = "_csrf";

/// Why a state-changing request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfRejection {
    #[error("No session for CSRF validation")]
    NoSession,
    #[error("Malformed request body")]
    MalformedBody,
    #[error("CSRF token missing")]
    Missing,
    #[error("Invalid or expired CSRF token")]
    Invalid,
}

impl CsrfRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            CsrfRejection::MalformedBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            CsrfRejection::NoSession => "no_session",
            CsrfRejection::MalformedBody => "malformed_body",
            CsrfRejection::Missing => "token_missing",
            CsrfRejection::Invalid => "token_invalid",
        }
    }
}

impl IntoResponse for CsrfRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn requires_token(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

pub async fn csrf_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !requires_token(request.method()) {
        return next.run(request).await;
    }

    let source = client_ip(request.extensions());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let session = request.extensions().get::<SessionId>().cloned();

    let rejection = match session {
        None => CsrfRejection::NoSession,
        Some(ref session) => match take_token(request, state.config.limits.max_body_size).await {
            Ok((Some(token), request)) if state.csrf.redeem(session.as_str(), &token) => {
                return next.run(request).await;
            }
            Ok((Some(_), _)) => CsrfRejection::Invalid,
            Ok((None, _)) => CsrfRejection::Missing,
            Err(rejection) => rejection,
        },
    };

    tracing::warn!(
        method = %method,
        path = %path,
        reason = rejection.reason(),
        "CSRF check failed"
    );
    events::emit(
        state.events.as_ref(),
        SecurityEventType::CsrfViolation,
        session.as_ref().map(SessionId::as_str),
        source,
        json!({
            "reason": rejection.reason(),
            "method": method.as_str(),
            "path": path,
        }),
    );

    rejection.into_response()
}

/// Pull the token from the header or the JSON body, handing the request back
/// with its body intact.
async fn take_token(
    request: Request,
    body_limit: usize,
) -> Result<(Option<String>, Request), CsrfRejection> {
    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
        .map(str::to_owned);
    if header_token.is_some() {
        return Ok((header_token, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|_| CsrfRejection::MalformedBody)?;
    let token = token_from_body(&bytes)?;
    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

fn token_from_body(bytes: &Bytes) -> Result<Option<String>, CsrfRejection> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_slice(bytes).map_err(|_| CsrfRejection::MalformedBody)?;
    Ok(value
        .get(CSRF_BODY_FIELD)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_owned))
}
