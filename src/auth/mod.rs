//! Identity-provider boundary.
//!
//! The guard never owns user records. It asks an [`Authenticator`] whether a
//! username/password pair is good and mints a session identifier on success.
//! The built-in [`StaticAuthenticator`] checks one configured account.

use subtle::ConstantTimeEq;

use crate::config::schema::AuthConfig;

/// Checks submitted credentials.
pub trait Authenticator: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// A single account taken from configuration.
pub struct StaticAuthenticator {
    username: String,
    password: String,
}

impl StaticAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }
}

impl Authenticator for StaticAuthenticator {
    fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both halves so timing does not reveal which one failed.
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        (user_ok & pass_ok).into()
    }
}
