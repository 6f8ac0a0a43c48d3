//! Route handlers.
//!
//! # Responsibilities
//! - Issue anti-forgery tokens to sessions
//! - Sign in with brute-force lockout, sign out
//! - Validate content submissions before they reach persistence
//! - Report guard status to the admin area
//!
//! # Design Decisions
//! - Lockout is checked before credentials, on both the user and the
//!   client address
//! - Validation failures answer with the first offending field only
//! - Every refusal carrying attacker input emits a security event

use std::net::IpAddr;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::http::request::{ClientIp, CurrentSession};
use crate::http::server::AppState;
use crate::observability::events::{self, SecurityEventType};
use crate::security::injection::{validate_id, validate_safe_input};
use crate::security::sanitizer::validate_and_sanitize_text;
use crate::security::session::{expired_session_cookie, session_cookie, SessionId};

/// JSON error body, with the offending field when there is one.
fn error_response(status: StatusCode, message: &str, field: Option<&str>) -> Response {
    let body = match field {
        Some(field) => json!({ "error": message, "field": field }),
        None => json!({ "error": message }),
    };
    (status, Json(body)).into_response()
}

pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/auth/csrf`: a fresh token for the caller's session.
pub async fn csrf_token(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Response {
    let Some(session) = session else {
        return error_response(StatusCode::UNAUTHORIZED, "Not authenticated", None);
    };
    let token = state.csrf.issue(session.as_str());
    Json(json!({ "csrfToken": token })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

fn failure_identifiers(username: &str, source: Option<IpAddr>) -> Vec<String> {
    let mut identifiers = vec![format!("user:{username}")];
    if let Some(ip) = source {
        identifiers.push(format!("ip:{ip}"));
    }
    identifiers
}

/// `POST /api/auth/signin`
pub async fn signin(
    State(state): State<AppState>,
    ClientIp(source): ClientIp,
    Json(form): Json<SignInRequest>,
) -> Response {
    let verdict = validate_safe_input(&form.username);
    if !verdict.is_valid {
        let message = verdict.message.unwrap_or_default();
        events::emit(
            state.events.as_ref(),
            SecurityEventType::SqlInjectionAttempt,
            None,
            source,
            json!({ "field": "username", "message": message }),
        );
        return error_response(StatusCode::BAD_REQUEST, &message, Some("username"));
    }

    let identifiers = failure_identifiers(&form.username, source);
    if let Some(flagged) = identifiers.iter().find(|id| state.failures.is_flagged(id)) {
        tracing::warn!(identifier = %flagged, "Sign-in refused, too many failures");
        events::emit(
            state.events.as_ref(),
            SecurityEventType::SuspiciousActivity,
            Some(flagged.as_str()),
            source,
            json!({
                "reason": "locked_out",
                "attempts": state.failures.get_failed_attempts(flagged),
            }),
        );
        return error_response(
            StatusCode::FORBIDDEN,
            "Too many failed attempts. Try again later.",
            None,
        );
    }

    if !state.authenticator.verify(&form.username, &form.password) {
        for identifier in &identifiers {
            state.failures.record_failure(identifier);
        }
        events::emit(
            state.events.as_ref(),
            SecurityEventType::AuthFailure,
            Some(identifiers[0].as_str()),
            source,
            json!({
                "attempts": state.failures.get_failed_attempts(&identifiers[0]),
            }),
        );
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials", None);
    }

    let session = SessionId::new(Uuid::new_v4().to_string());
    tracing::info!(username = %form.username, "Signed in");
    (
        [(header::SET_COOKIE, session_cookie(&session))],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

/// `POST /api/auth/signout`: drop the session's tokens and expire the cookie.
pub async fn signout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Response {
    if let Some(session) = session {
        state.csrf.clear(session.as_str());
    }
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

/// `GET /admin`
pub async fn admin_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "csrf_sessions": state.csrf.session_count(),
        "tracked_identifiers": state.failures.tracked_identifiers(),
        "failure_threshold": state.failures.threshold(),
        "failure_window_secs": state.failures.window().as_secs(),
    }))
}

/// A content record submitted from the admin area.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContentSubmission {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A refused field and the event it warrants.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldRejection {
    pub field: &'static str,
    pub message: String,
    pub event_type: SecurityEventType,
}

fn check_text(field: &'static str, value: &str) -> Result<String, FieldRejection> {
    let xss = validate_and_sanitize_text(value);
    if !xss.is_valid {
        return Err(FieldRejection {
            field,
            message: xss.message.unwrap_or_default(),
            event_type: SecurityEventType::XssAttempt,
        });
    }
    let sql = validate_safe_input(value);
    if !sql.is_valid {
        return Err(FieldRejection {
            field,
            message: sql.message.unwrap_or_default(),
            event_type: SecurityEventType::SqlInjectionAttempt,
        });
    }
    Ok(xss.sanitized.unwrap_or_default())
}

impl ContentSubmission {
    /// Validate every field, returning the sanitized record or the first refusal.
    pub fn validate(&self) -> Result<ContentSubmission, FieldRejection> {
        if !validate_id(&self.id) {
            return Err(FieldRejection {
                field: "id",
                message: "Invalid identifier".to_string(),
                event_type: SecurityEventType::SqlInjectionAttempt,
            });
        }

        Ok(ContentSubmission {
            id: self.id.clone(),
            title: check_text("title", &self.title)?,
            description: check_text("description", &self.description)?,
            tags: self
                .tags
                .iter()
                .map(|tag| check_text("tags", tag))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// `POST|PUT /api/admin/content`
pub async fn submit_content(
    State(state): State<AppState>,
    ClientIp(source): ClientIp,
    CurrentSession(session): CurrentSession,
    Json(submission): Json<ContentSubmission>,
) -> Response {
    match submission.validate() {
        Ok(clean) => {
            tracing::info!(id = %clean.id, "Content accepted");
            (StatusCode::CREATED, Json(clean)).into_response()
        }
        Err(rejection) => {
            events::emit(
                state.events.as_ref(),
                rejection.event_type,
                session.as_ref().map(SessionId::as_str),
                source,
                json!({ "field": rejection.field, "message": rejection.message }),
            );
            error_response(
                StatusCode::BAD_REQUEST,
                &rejection.message,
                Some(rejection.field),
            )
        }
    }
}
