//! Portfolio guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                 PORTFOLIO GUARD                  │
//!                     │                                                  │
//!   Client Request    │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!   ──────────────────┼─▶│  layers  │──▶│   gate   │──▶│   router    │   │
//!                     │  │trace/id/ │   │ reject / │   │ csrf check  │   │
//!                     │  │limit/hdr │   │challenge │   │ + handlers  │   │
//!                     │  └──────────┘   └──────────┘   └──────┬──────┘   │
//!                     │                                       │          │
//!                     │            ┌──────────────────────────┤          │
//!                     │            ▼                          ▼          │
//!                     │  ┌──────────────────┐   ┌─────────────────────┐  │
//!                     │  │ token store      │   │ sanitizer/injection │  │
//!                     │  │ failure tracker  │   │ verdicts            │  │
//!                     │  └────────┬─────────┘   └─────────────────────┘  │
//!                     │           ▼                                      │
//!                     │  ┌──────────────────┐                            │
//!                     │  │ security events  │ → tracing + metrics        │
//!                     │  └──────────────────┘                            │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use portfolio_guard::config::{load_config, watcher::ConfigWatcher, GuardConfig};
use portfolio_guard::lifecycle::Shutdown;
use portfolio_guard::observability::{logging, metrics};
use portfolio_guard::HttpServer;

#[derive(Parser)]
#[command(name = "portfolio-guard")]
#[command(about = "Request defense layer for the portfolio site", long_about = None)]
struct Args {
    /// TOML configuration file. Watched for gate policy changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("portfolio-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        protected_prefixes = ?config.gate.protected_prefixes,
        failure_window_secs = config.failures.window_secs,
        failure_threshold = config.failures.threshold,
        "Configuration loaded"
    );
    if config.auth.password == GuardConfig::default().auth.password {
        tracing::warn!("auth.password is the built-in placeholder; set it before exposing the site");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    shutdown.trigger_on_signal().await;

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
