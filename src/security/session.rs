//! Session identifier extraction from the `Cookie` header.
//!
//! Only presence is checked here. Signature and expiry of the cookie belong
//! to the identity provider, which sees the same cookie on protected calls.

use std::fmt;

use axum::http::{header, HeaderMap};
use thiserror::Error;

/// Cookie names recognized as carrying a session.
pub const DEFAULT_SESSION_COOKIES: [&str; 3] = [
    "next-auth.session-token",
    "__Secure-next-auth.session-token",
    "sessionId",
];

/// Opaque session identifier (the session cookie value).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cookie header is not valid visible ASCII")]
    MalformedCookieHeader,
}

/// Find the first recognized session cookie.
///
/// Names are tried in the order given. Empty values do not count.
pub fn find_session(
    headers: &HeaderMap,
    cookie_names: &[String],
) -> Result<Option<SessionId>, SessionError> {
    let mut pairs = Vec::new();
    for value in headers.get_all(header::COOKIE) {
        let raw = value
            .to_str()
            .map_err(|_| SessionError::MalformedCookieHeader)?;
        pairs.extend(
            raw.split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .map(|(name, value)| (name.trim(), value.trim())),
        );
    }

    for wanted in cookie_names {
        let found = pairs
            .iter()
            .find(|(name, value)| *name == wanted.as_str() && !value.is_empty());
        if let Some((_, value)) = found {
            return Ok(Some(SessionId::new(*value)));
        }
    }
    Ok(None)
}

/// `Set-Cookie` value establishing a `sessionId` session.
pub fn session_cookie(session: &SessionId) -> String {
    format!("sessionId={session}; HttpOnly; SameSite=Lax; Path=/")
}

/// `Set-Cookie` value expiring the `sessionId` cookie.
pub fn expired_session_cookie() -> String {
    "sessionId=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0".to_string()
}
