//! In-process request defense layer for a portfolio web application.
//!
//! Gate every request, issue and redeem anti-forgery tokens, lock out
//! brute-force sign-in attempts, and screen user input for XSS and SQL
//! injection before it reaches persistence.
//!
//! Token and failure state is process-local; separate instances do not
//! share it.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
