//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use portfolio_guard::config::GuardConfig;
use portfolio_guard::http::HttpServer;
use portfolio_guard::lifecycle::Shutdown;
use portfolio_guard::observability::MemorySink;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct horse battery staple";

/// A guard running on an ephemeral port with events captured in memory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub events: Arc<MemorySink>,
    pub config_tx: mpsc::UnboundedSender<GuardConfig>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Default config with known credentials and metrics off.
pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.auth.username = USERNAME.to_string();
    config.auth.password = PASSWORD.to_string();
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_server(config: GuardConfig) -> TestServer {
    let events = Arc::new(MemorySink::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::with_event_sink(config, events.clone());
    let shutdown = Shutdown::new();
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_rx, server_shutdown).await;
    });

    TestServer {
        addr,
        events,
        config_tx,
        shutdown,
    }
}

/// Client that never follows redirects, so challenges stay visible.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Sign in and return the `sessionId` cookie value.
pub async fn sign_in(server: &TestServer) -> String {
    let res = client()
        .post(server.url("/api/auth/signin"))
        .json(&serde_json::json!({ "username": USERNAME, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let cookie = res
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("sign-in sets a cookie")
        .to_str()
        .unwrap()
        .to_string();
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("sessionId="))
        .expect("sessionId cookie")
        .to_string()
}

/// Fetch a fresh anti-forgery token for `session`.
pub async fn csrf_token(server: &TestServer, session: &str) -> String {
    let res = client()
        .get(server.url("/api/auth/csrf"))
        .header(reqwest::header::COOKIE, format!("sessionId={session}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    body["csrfToken"].as_str().unwrap().to_string()
}
