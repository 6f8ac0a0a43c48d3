//! Request middleware run inside the tower-http layers.

pub mod csrf;
pub mod gate;

pub use csrf::{csrf_middleware, CsrfRejection};
pub use gate::gate_middleware;
