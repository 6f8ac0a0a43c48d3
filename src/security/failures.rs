//! Sliding-window authentication failure tracking.
//!
//! # Responsibilities
//! - Record timestamped failures per identifier (`user:<name>`, `ip:<addr>`)
//! - Count failures inside the trailing window
//! - Emit `SUSPICIOUS_ACTIVITY` when the count reaches the threshold
//!
//! # Design Decisions
//! - Pruning is lazy, on the next read or write of the same identifier.
//!   There is no sweeper task; identifiers that go quiet keep their stale
//!   entries until touched again.
//! - An entry exactly `window` old is already outside the window

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::json;

use crate::observability::events::{self, EventSink, SecurityEventType};
use crate::observability::metrics;

/// Default sliding window.
pub const FAILURE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default failures inside the window that flag an identifier.
pub const FAILURE_THRESHOLD: usize = 5;

/// Per-identifier failure history.
pub struct FailureTracker {
    attempts: DashMap<String, VecDeque<Instant>>,
    window: Duration,
    threshold: usize,
    events: Arc<dyn EventSink>,
}

impl FailureTracker {
    pub fn new(window: Duration, threshold: usize, events: Arc<dyn EventSink>) -> Self {
        Self {
            attempts: DashMap::new(),
            window,
            threshold,
            events,
        }
    }

    /// Tracker with the default 15 minute window and threshold of 5.
    pub fn with_defaults(events: Arc<dyn EventSink>) -> Self {
        Self::new(FAILURE_WINDOW, FAILURE_THRESHOLD, events)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a failure for `identifier` now.
    pub fn record_failure(&self, identifier: &str) {
        self.record_failure_at(identifier, Instant::now());
    }

    /// Record a failure observed at `now`.
    pub fn record_failure_at(&self, identifier: &str, now: Instant) {
        let count = {
            let mut history = self.attempts.entry(identifier.to_owned()).or_default();
            history.push_back(now);
            prune(&mut history, now, self.window);
            history.len()
        };

        metrics::record_auth_failure();
        tracing::debug!(identifier = %identifier, attempts = count, "Authentication failure recorded");

        if count >= self.threshold {
            events::emit(
                self.events.as_ref(),
                SecurityEventType::SuspiciousActivity,
                Some(identifier),
                None,
                json!({
                    "reason": "failed_authentication_threshold",
                    "attempts": count,
                    "window_secs": self.window.as_secs(),
                }),
            );
        }
    }

    /// In-window failure count for `identifier`.
    pub fn get_failed_attempts(&self, identifier: &str) -> usize {
        self.get_failed_attempts_at(identifier, Instant::now())
    }

    /// In-window failure count as seen at `now`.
    pub fn get_failed_attempts_at(&self, identifier: &str, now: Instant) -> usize {
        let count = match self.attempts.get_mut(identifier) {
            Some(mut history) => {
                prune(&mut history, now, self.window);
                history.len()
            }
            None => return 0,
        };

        if count == 0 {
            self.attempts.remove_if(identifier, |_, history| history.is_empty());
        }
        count
    }

    /// True when `identifier` has reached the threshold inside the window.
    pub fn is_flagged(&self, identifier: &str) -> bool {
        self.get_failed_attempts(identifier) >= self.threshold
    }

    /// Identifiers with any retained history, pruned or not.
    pub fn tracked_identifiers(&self) -> usize {
        self.attempts.len()
    }
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = history.front() {
        if now.saturating_duration_since(oldest) >= window {
            history.pop_front();
        } else {
            break;
        }
    }
}
