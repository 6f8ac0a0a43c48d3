//! Shutdown coordination for the guard.

use tokio::sync::broadcast;

use crate::lifecycle::signals;

/// Coordinator for graceful shutdown.
///
/// The server and the config reload task subscribe; `main` triggers once a
/// signal arrives.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Safe to call with no subscribers.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for SIGINT or SIGTERM, then trigger. A failed signal
    /// registration triggers immediately.
    pub async fn trigger_on_signal(&self) {
        match signals::wait_for_signal().await {
            Ok(signal) => tracing::info!(signal, "Shutting down"),
            Err(e) => tracing::error!(error = %e, "Signal handler failed, shutting down"),
        }
        self.trigger();
    }

    /// Subscribers still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
