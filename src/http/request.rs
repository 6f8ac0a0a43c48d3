//! Request-side context shared by middleware and handlers.
//!
//! # Responsibilities
//! - Resolve the client address from the connection info
//! - Expose the session identifier the gate attached
//! - Read the request ID set by the request-id layer
//!
//! # Design Decisions
//! - Extractors never reject: absence is a value handlers decide on
//! - Requests served without connection info (tests, in-process calls)
//!   simply have no client address

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};

use crate::security::session::SessionId;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Client IP taken from `ConnectInfo<SocketAddr>`, when the server recorded it.
pub fn client_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Request ID header value, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Extractor for the client IP.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.extensions)))
    }
}

/// Extractor for the session the gate found, if any.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<SessionId>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(parts.extensions.get::<SessionId>().cloned()))
    }
}
