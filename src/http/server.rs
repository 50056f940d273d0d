//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing) and shared state
//! - Build the executor registry at boot
//! - Serve with graceful shutdown, cancelling in-flight work

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::dispatch::controller::dispatch_handler;
use crate::dispatch::Validator;
use crate::executor::{ExecutorRegistry, HttpExecutor, ShellExecutor};
use crate::observability::MetricsRegistry;
use crate::resilience::RetryController;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ExecutorRegistry>,
    pub metrics: Arc<MetricsRegistry>,
    pub clock: Arc<dyn Clock>,
    pub retry: Arc<RetryController>,
    pub validator: Arc<Validator>,
    /// Parent of every per-request cancellation tree; cancelled on
    /// shutdown.
    pub root_cancel: CancellationToken,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    root_cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server with an injected clock (used by tests).
    pub fn with_clock(
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let config = Arc::new(config);

        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(HttpExecutor::new(
            config.http.clone(),
            &config.retry,
            clock.clone(),
        )?));
        registry.register(Arc::new(ShellExecutor::new(config.shell.clone(), clock.clone())));

        let root_cancel = CancellationToken::new();
        let state = AppState {
            registry: Arc::new(registry),
            metrics: Arc::new(MetricsRegistry::new()),
            retry: Arc::new(RetryController::new(config.retry.clone(), clock.clone())),
            validator: Arc::new(Validator::new(config.service.max_request_body_kb)),
            clock,
            root_cancel: root_cancel.clone(),
            config,
        };

        Ok(Self {
            router: Self::build_router(state),
            root_cancel,
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/ping", get(ping_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api", dispatch_routes())
            .route("/api/{*path}", dispatch_routes())
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires. In-flight requests
    /// see their cancellation tokens cancelled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let root_cancel = self.root_cancel;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                root_cancel.cancel();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// The dispatch route accepts the five forwarded methods.
fn dispatch_routes() -> MethodRouter<AppState> {
    get(dispatch_handler)
        .post(dispatch_handler)
        .put(dispatch_handler)
        .patch(dispatch_handler)
        .delete(dispatch_handler)
}

/// GET /ping — liveness probe.
async fn ping_handler() -> &'static str {
    "pong"
}

/// GET /metrics — JSON snapshot of the in-process accumulator.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "timestamp": state.clock.now(),
        "instance": state.config.service.instance_id,
        "metrics": state.metrics.snapshot(),
    }))
}
