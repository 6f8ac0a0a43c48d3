//! Configuration file watcher for hot reload.
//!
//! Only the `[gate]` section is applied to a running server. A rewrite that
//! changes nothing in it is not forwarded; changes to other sections are
//! logged as taking effect on the next restart.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;

/// Watches one configuration file and forwards gate policy changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: GuardConfig,
    update_tx: mpsc::UnboundedSender<GuardConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the server started with.
    ///
    /// Returns the watcher and a receiver of validated configs whose gate
    /// section differs from the last one seen.
    pub fn new(path: &Path, current: GuardConfig) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    ///
    /// The parent directory is watched so editors that replace the file
    /// (write to a temp file, then rename) are still seen.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher {
            path,
            mut current,
            update_tx,
        } = self;
        let file_name = path.file_name().map(OsString::from);
        let watch_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event, file_name.as_deref()) => {
                    match load_config(&config_path) {
                        Ok(next) => {
                            apply_reload(&mut current, next, &update_tx);
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Failed to reload config. Keeping current configuration."
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Modify or create events touching the config file itself.
fn is_relevant(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    match file_name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

fn apply_reload(
    current: &mut GuardConfig,
    next: GuardConfig,
    update_tx: &mpsc::UnboundedSender<GuardConfig>,
) {
    let cold = restart_sections(current, &next);
    if !cold.is_empty() {
        tracing::warn!(sections = ?cold, "Config sections changed; they apply on restart");
    }

    if next.gate == current.gate {
        tracing::debug!("Config rewritten, gate policy unchanged");
    } else {
        tracing::info!("Config file change detected, reloading gate policy");
        let _ = update_tx.send(next.clone());
    }
    *current = next;
}

/// Sections that differ between `old` and `new` but are only read at startup.
pub fn restart_sections(old: &GuardConfig, new: &GuardConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.listener != new.listener {
        changed.push("listener");
    }
    if old.csrf != new.csrf {
        changed.push("csrf");
    }
    if old.failures != new.failures {
        changed.push("failures");
    }
    if old.headers != new.headers {
        changed.push("headers");
    }
    if old.auth != new.auth {
        changed.push("auth");
    }
    if old.timeouts != new.timeouts {
        changed.push("timeouts");
    }
    if old.limits != new.limits {
        changed.push("limits");
    }
    if old.observability != new.observability {
        changed.push("observability");
    }
    changed
}
