//! Request gate middleware.
//!
//! Runs [`RequestGate::check`](crate::security::RequestGate::check) on every
//! request and turns the decision into a response or a pass to the router.
//! The session the gate found rides along in request extensions.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::http::request::client_ip;
use crate::http::server::AppState;
use crate::security::GateDecision;

pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let source = client_ip(request.extensions());

    match state.gate.check(request.uri(), request.headers(), source) {
        GateDecision::Rejected(_) => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        GateDecision::Challenge { location } => Redirect::temporary(&location).into_response(),
        GateDecision::Authenticated(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        GateDecision::PassThrough { session } => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
    }
}
