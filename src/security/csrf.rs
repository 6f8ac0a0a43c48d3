//! Single-use anti-forgery tokens bound to a session.
//!
//! # Responsibilities
//! - Issue random tokens per session, bounded per session
//! - Redeem a token at most once
//! - Drop every token of a session on sign-out
//!
//! # Design Decisions
//! - Tokens live in issuance order; overflow evicts the oldest
//! - DashMap shard locks serialize work on one session while other
//!   sessions proceed in parallel
//! - Token comparison is constant time

use std::collections::VecDeque;

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::observability::metrics;

/// Default per-session token bound.
pub const MAX_TOKENS_PER_SESSION: usize = 10;

/// Length of an issued token in characters.
pub const TOKEN_LENGTH: usize = 64;

/// In-process anti-forgery token store.
#[derive(Debug)]
pub struct CsrfTokenStore {
    tokens: DashMap<String, VecDeque<String>>,
    max_per_session: usize,
}

impl CsrfTokenStore {
    /// Create a store holding at most `max_per_session` tokens per session.
    pub fn new(max_per_session: usize) -> Self {
        Self {
            tokens: DashMap::new(),
            max_per_session: max_per_session.max(1),
        }
    }

    /// Issue a fresh token for `session_id`, evicting the oldest on overflow.
    pub fn issue(&self, session_id: &str) -> String {
        let token = generate_token();

        let mut queue = self.tokens.entry(session_id.to_owned()).or_default();
        while queue.len() >= self.max_per_session {
            queue.pop_front();
        }
        queue.push_back(token.clone());
        drop(queue);

        metrics::record_csrf_issued();
        tracing::debug!("CSRF token issued");
        token
    }

    /// Check and consume `token`. Returns true at most once per issued token.
    pub fn redeem(&self, session_id: &str, token: &str) -> bool {
        let redeemed = match self.tokens.get_mut(session_id) {
            Some(mut queue) => match queue.iter().position(|t| tokens_equal(t, token)) {
                Some(index) => {
                    queue.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };

        if redeemed {
            self.tokens.remove_if(session_id, |_, queue| queue.is_empty());
        }

        metrics::record_csrf_redemption(redeemed);
        redeemed
    }

    /// Forget every token of `session_id`.
    pub fn clear(&self, session_id: &str) {
        self.tokens.remove(session_id);
    }

    /// Live tokens held for `session_id`.
    pub fn token_count(&self, session_id: &str) -> usize {
        self.tokens.get(session_id).map(|q| q.len()).unwrap_or(0)
    }

    /// Sessions currently holding at least one token.
    pub fn session_count(&self) -> usize {
        self.tokens.len()
    }
}

impl Default for CsrfTokenStore {
    fn default() -> Self {
        Self::new(MAX_TOKENS_PER_SESSION)
    }
}

fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn tokens_equal(stored: &str, candidate: &str) -> bool {
    bool::from(stored.as_bytes().ct_eq(candidate.as_bytes()))
}
