//! Security event sink.
//!
//! # Responsibilities
//! - Shape security-relevant facts into immutable `SecurityEvent` records
//! - Hand them to a sink (tracing in production, memory in tests)
//!
//! # Design Decisions
//! - Fire and forget: emitting never fails, never blocks, never retries
//! - Events are write-only; nothing in the guard reads them back
//! - The sink is injected, never global, so tests can observe emissions

use std::fmt;
use std::net::IpAddr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::observability::metrics;

/// Kind of security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    /// Wrong credentials on sign-in.
    AuthFailure,
    /// Anti-forgery token absent, unknown or already redeemed.
    CsrfViolation,
    /// Free-form text matched the XSS battery.
    XssAttempt,
    /// Free-form text matched the SQL battery.
    SqlInjectionAttempt,
    /// Failure threshold reached inside the sliding window.
    SuspiciousActivity,
    /// Request carried a known scanner user agent.
    ScannerBlocked,
    /// Request path or query carried a traversal sequence.
    PathTraversal,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::AuthFailure => "AUTH_FAILURE",
            SecurityEventType::CsrfViolation => "CSRF_VIOLATION",
            SecurityEventType::XssAttempt => "XSS_ATTEMPT",
            SecurityEventType::SqlInjectionAttempt => "SQL_INJECTION_ATTEMPT",
            SecurityEventType::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            SecurityEventType::ScannerBlocked => "SCANNER_BLOCKED",
            SecurityEventType::PathTraversal => "PATH_TRAVERSAL",
        }
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable security event record.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: SecurityEventType,
    /// Session, user or failure identifier the event is about.
    pub subject: Option<String>,
    pub source_address: Option<IpAddr>,
    pub detail: Value,
}

impl SecurityEvent {
    pub fn new(
        event_type: SecurityEventType,
        subject: Option<&str>,
        source_address: Option<IpAddr>,
        detail: Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            subject: subject.map(str::to_owned),
            source_address,
            detail,
        }
    }
}

/// Destination for security events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SecurityEvent);
}

/// Build an event and hand it to `sink`.
pub fn emit(
    sink: &dyn EventSink,
    event_type: SecurityEventType,
    subject: Option<&str>,
    source_address: Option<IpAddr>,
    detail: Value,
) {
    sink.emit(SecurityEvent::new(event_type, subject, source_address, detail));
}

/// Writes every event as one structured `warn` record on the `security` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SecurityEvent) {
        metrics::record_security_event(event.event_type.as_str());

        let source = event
            .source_address
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        tracing::warn!(
            target: "security",
            timestamp = %event.timestamp.to_rfc3339(),
            event_type = %event.event_type,
            subject = event.subject.as_deref().unwrap_or("-"),
            source = %source,
            detail = %event.detail,
            "Security event"
        );
    }
}

/// Keeps events in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of events of the given type.
    pub fn count(&self, event_type: SecurityEventType) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.event_type == event_type).count())
            .unwrap_or(0)
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SecurityEvent) {
        // A poisoned lock drops the event; emission is best effort.
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
