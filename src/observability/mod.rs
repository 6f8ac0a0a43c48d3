//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate / csrf / failure tracker / validators
//!     → events.rs (SecurityEvent → EventSink)
//!         → TracingSink: `security` target warn records
//!         → metrics.rs: guard_security_events_total
//!
//! Everything else:
//!     → logging.rs (tracing subscriber, EnvFilter)
//!     → metrics.rs (Prometheus scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - Security events are best effort and never a correctness dependency
//! - Request ID flows through access logs via tower-http

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{EventSink, MemorySink, SecurityEvent, SecurityEventType, TracingSink};
