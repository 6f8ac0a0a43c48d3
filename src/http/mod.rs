//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → middleware/gate.rs (reject, challenge, attach session)
//!     → middleware/csrf.rs (protected writes only)
//!     → handlers.rs (sign-in, tokens, content validation)
//!     → Send to client with security headers
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::{ClientIp, CurrentSession, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
