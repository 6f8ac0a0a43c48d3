//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit,
//!   security headers, request gate)
//! - Bind server to listener
//! - Apply gate policy reloads pushed by the config watcher
//!
//! # Layer order (outermost first)
//! ```text
//! set request id → trace → propagate request id → timeout → body limit
//!     → security headers → gate → router (csrf on protected writes)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{Authenticator, StaticAuthenticator};
use crate::config::GuardConfig;
use crate::http::handlers;
use crate::http::middleware::{csrf::csrf_middleware, gate::gate_middleware};
use crate::http::request::request_id;
use crate::observability::events::{EventSink, TracingSink};
use crate::security::headers;
use crate::security::{CsrfTokenStore, FailureTracker, GatePolicy, RequestGate};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub csrf: Arc<CsrfTokenStore>,
    pub failures: Arc<FailureTracker>,
    pub events: Arc<dyn EventSink>,
    pub authenticator: Arc<dyn Authenticator>,
    pub config: Arc<GuardConfig>,
}

impl AppState {
    /// Build every store from `config`, sharing one event sink.
    pub fn new(
        config: GuardConfig,
        events: Arc<dyn EventSink>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let gate = RequestGate::new(GatePolicy::from_config(&config.gate), events.clone());
        let csrf = CsrfTokenStore::new(config.csrf.max_tokens_per_session);
        let failures = FailureTracker::new(
            Duration::from_secs(config.failures.window_secs),
            config.failures.threshold,
            events.clone(),
        );

        Self {
            gate: Arc::new(gate),
            csrf: Arc::new(csrf),
            failures: Arc::new(failures),
            events,
            authenticator,
            config: Arc::new(config),
        }
    }
}

/// HTTP server for the guard.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server that reports security events through tracing.
    pub fn new(config: GuardConfig) -> Self {
        Self::with_event_sink(config, Arc::new(TracingSink))
    }

    /// Create a server with a caller-supplied event sink.
    pub fn with_event_sink(config: GuardConfig, events: Arc<dyn EventSink>) -> Self {
        let authenticator = Arc::new(StaticAuthenticator::from_config(&config.auth));
        Self::with_parts(config, events, authenticator)
    }

    /// Create a server with both the event sink and the authenticator supplied.
    pub fn with_parts(
        config: GuardConfig,
        events: Arc<dyn EventSink>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let state = AppState::new(config, events, authenticator);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();

        let csrf = middleware::from_fn_with_state(state.clone(), csrf_middleware);
        let content = post(handlers::submit_content)
            .put(handlers::submit_content)
            .route_layer(csrf.clone());
        let signout = post(handlers::signout).route_layer(csrf);

        let router = Router::new()
            .route("/health", get(handlers::health))
            .route("/api/auth/csrf", get(handlers::csrf_token))
            .route("/api/auth/signin", post(handlers::signin))
            .route("/api/auth/signout", signout)
            .route("/admin", get(handlers::admin_status))
            .route("/api/admin/content", content)
            .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
            .with_state(state);

        headers::apply(router, &config.headers)
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id(request.headers()),
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// A clone of the fully layered router, for in-process calls.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config the server was built with.
    pub fn config(&self) -> &GuardConfig {
        &self.state.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs arriving on `config_updates` replace the gate policy; token
    /// and failure state are untouched by a reload.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let gate = self.state.gate.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                gate.update_policy(GatePolicy::from_config(&config.gate));
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
