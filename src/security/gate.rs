//! Request gate: signature rejection, pass-through, session challenge.
//!
//! # Responsibilities
//! - Reject known scanner user agents and path traversal with 403
//! - Let static assets, auth endpoints and public pages through
//! - Challenge protected paths that carry no session cookie
//!
//! # Design Decisions
//! - Signatures are checked before anything touches the session, so a
//!   malformed request never reaches authentication logic
//! - The session check is presence only; cookie trust is the identity
//!   provider's job
//! - Cookie parse errors challenge (fail closed)
//! - The policy sits behind arc-swap so config reloads never block requests

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{header, HeaderMap, Uri};
use serde_json::json;
use url::form_urlencoded;

use crate::config::schema::GateConfig;
use crate::observability::events::{self, EventSink, SecurityEventType};
use crate::observability::metrics;
use crate::security::session::{find_session, SessionId};

/// Percent-decoding rounds applied before giving up on a target.
const MAX_DECODE_DEPTH: usize = 3;

/// Compiled gate policy.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    protected_prefixes: Vec<String>,
    static_prefixes: Vec<String>,
    static_extensions: Vec<String>,
    auth_prefixes: Vec<String>,
    signin_path: String,
    session_cookie_names: Vec<String>,
    blocked_user_agents: Vec<String>,
}

impl GatePolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            protected_prefixes: config.protected_prefixes.clone(),
            static_prefixes: config.static_prefixes.clone(),
            static_extensions: config
                .static_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            auth_prefixes: config.auth_prefixes.clone(),
            signin_path: config.signin_path.clone(),
            session_cookie_names: config.session_cookie_names.clone(),
            blocked_user_agents: config
                .blocked_user_agents
                .iter()
                .map(|ua| ua.to_ascii_lowercase())
                .filter(|ua| !ua.is_empty())
                .collect(),
        }
    }

    pub fn session_cookie_names(&self) -> &[String] {
        &self.session_cookie_names
    }

    pub fn signin_path(&self) -> &str {
        &self.signin_path
    }

    fn is_static(&self, path: &str) -> bool {
        if self.static_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        let last_segment = path.rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.static_extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }

    fn is_auth_endpoint(&self, path: &str) -> bool {
        prefix_matches(path, &self.signin_path)
            || self.auth_prefixes.iter().any(|p| prefix_matches(path, p))
    }

    fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|p| prefix_matches(path, p))
    }

    fn scanner_signature(&self, headers: &HeaderMap) -> Option<&str> {
        let user_agent = headers.get(header::USER_AGENT)?;
        let user_agent = String::from_utf8_lossy(user_agent.as_bytes()).to_ascii_lowercase();
        self.blocked_user_agents
            .iter()
            .find(|sig| user_agent.contains(sig.as_str()))
            .map(String::as_str)
    }

    /// Sign-in location carrying `callback` as `callbackUrl`.
    pub fn challenge_location(&self, callback: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("callbackUrl", callback)
            .finish();
        format!("{}?{}", self.signin_path, query)
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

/// `/admin` matches `/admin` and `/admin/x`, not `/administrator`.
/// A prefix ending in `/` matches anything below it.
fn prefix_matches(path: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn contains_traversal(target: &str) -> bool {
    target.contains("../")
        || target.contains("..\\")
        || target.split(['/', '\\']).any(|segment| segment == "..")
}

/// Traversal in the path or query, plain or percent-encoded up to
/// [`MAX_DECODE_DEPTH`] times over.
fn has_traversal(uri: &Uri) -> bool {
    let mut current = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
        .to_owned();

    for _ in 0..=MAX_DECODE_DEPTH {
        if contains_traversal(&current) {
            return true;
        }
        let decoded = String::from_utf8_lossy(&urlencoding::decode_binary(current.as_bytes()))
            .into_owned();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    false
}

/// Why the gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ScannerUserAgent { signature: String },
    PathTraversal,
}

impl RejectReason {
    pub fn event_type(&self) -> SecurityEventType {
        match self {
            RejectReason::ScannerUserAgent { .. } => SecurityEventType::ScannerBlocked,
            RejectReason::PathTraversal => SecurityEventType::PathTraversal,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ScannerUserAgent { signature } => {
                write!(f, "scanner user agent ({signature})")
            }
            RejectReason::PathTraversal => f.write_str("path traversal"),
        }
    }
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Static asset, auth endpoint or public page. Session attached if present.
    PassThrough { session: Option<SessionId> },
    /// Protected path with a session cookie present.
    Authenticated(SessionId),
    /// Protected path without a session: redirect to sign-in.
    Challenge { location: String },
    /// Signature match: 403, no further processing.
    Rejected(RejectReason),
}

impl GateDecision {
    pub fn outcome(&self) -> &'static str {
        match self {
            GateDecision::PassThrough { .. } => "pass_through",
            GateDecision::Authenticated(_) => "authenticated",
            GateDecision::Challenge { .. } => "challenge",
            GateDecision::Rejected(_) => "rejected",
        }
    }
}

/// Decide what to do with a request. Pure; no logging or events.
pub fn evaluate(policy: &GatePolicy, uri: &Uri, headers: &HeaderMap) -> GateDecision {
    if has_traversal(uri) {
        return GateDecision::Rejected(RejectReason::PathTraversal);
    }
    if let Some(signature) = policy.scanner_signature(headers) {
        return GateDecision::Rejected(RejectReason::ScannerUserAgent {
            signature: signature.to_string(),
        });
    }

    let path = uri.path();
    let session = find_session(headers, &policy.session_cookie_names);

    if policy.is_static(path) || policy.is_auth_endpoint(path) || !policy.is_protected(path) {
        return GateDecision::PassThrough {
            session: session.ok().flatten(),
        };
    }

    match session {
        Ok(Some(id)) => GateDecision::Authenticated(id),
        Ok(None) | Err(_) => {
            let callback = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path);
            GateDecision::Challenge {
                location: policy.challenge_location(callback),
            }
        }
    }
}

/// The gate as wired into the server: swappable policy plus event emission.
pub struct RequestGate {
    policy: ArcSwap<GatePolicy>,
    events: Arc<dyn EventSink>,
}

impl RequestGate {
    pub fn new(policy: GatePolicy, events: Arc<dyn EventSink>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            events,
        }
    }

    /// Current policy snapshot.
    pub fn policy(&self) -> Arc<GatePolicy> {
        self.policy.load_full()
    }

    /// Replace the policy; in-flight requests keep the snapshot they loaded.
    pub fn update_policy(&self, policy: GatePolicy) {
        self.policy.store(Arc::new(policy));
        tracing::info!("Gate policy updated");
    }

    /// Evaluate a request, recording metrics and security events.
    pub fn check(&self, uri: &Uri, headers: &HeaderMap, source: Option<IpAddr>) -> GateDecision {
        let policy = self.policy.load();
        let decision = evaluate(&policy, uri, headers);
        metrics::record_gate_decision(decision.outcome());

        match &decision {
            GateDecision::Rejected(reason) => {
                let user_agent = headers
                    .get(header::USER_AGENT)
                    .map(|ua| String::from_utf8_lossy(ua.as_bytes()).into_owned());
                tracing::warn!(
                    path = %uri.path(),
                    reason = %reason,
                    source = ?source,
                    "Request rejected by gate"
                );
                events::emit(
                    self.events.as_ref(),
                    reason.event_type(),
                    None,
                    source,
                    json!({
                        "path": uri.path(),
                        "reason": reason.to_string(),
                        "user_agent": user_agent,
                    }),
                );
            }
            GateDecision::Challenge { location } => {
                tracing::debug!(path = %uri.path(), location = %location, "No session, challenging");
            }
            _ => {}
        }

        decision
    }
}
