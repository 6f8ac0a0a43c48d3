//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security headers on the way out)
//!     → gate.rs (signature rejection, session challenge)
//!         → session.rs (find the session cookie)
//!     → csrf.rs (token redemption on state-changing API calls)
//!     → handlers:
//!         sanitizer.rs (XSS), injection.rs (SQL) → verdict.rs
//!         failures.rs (brute-force window per identifier)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Heuristics never error; they return bool, String or Verdict

pub mod csrf;
pub mod failures;
pub mod gate;
pub mod headers;
pub mod injection;
pub mod sanitizer;
pub mod session;
pub mod signature;
pub mod verdict;

pub use csrf::CsrfTokenStore;
pub use failures::FailureTracker;
pub use gate::{GateDecision, GatePolicy, RequestGate};
pub use session::SessionId;
pub use verdict::Verdict;
