//! Remote Executor Gateway
//!
//! A request-forwarding gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────┐
//!                      │                REMOTE EXECUTOR                 │
//!                      │                                                │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   ┌─────────────┐ │
//!   ───────────────────┼─▶│  http   │──▶│ dispatch │──▶│  executor   │ │
//!                      │  │ server  │   │ pipeline │   │  registry   │ │
//!                      │  └─────────┘   └────┬─────┘   └──────┬──────┘ │
//!                      │                     │                │        │
//!                      │                     ▼                ▼        │
//!                      │              ┌────────────┐   ┌─────────────┐ │
//!                      │              │ resilience │   │ http / shell│ │
//!                      │              │ retry loop │   │  executors  │ │
//!                      │              └────────────┘   └─────────────┘ │
//!                      │                                                │
//!                      │  ┌──────────────────────────────────────────┐  │
//!                      │  │          Cross-Cutting Concerns          │  │
//!                      │  │  config · observability · lifecycle      │  │
//!                      │  └──────────────────────────────────────────┘  │
//!                      └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_executor::config::loader::load_config;
use remote_executor::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remote_executor=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("remote-executor starting");

    // Optional config file path as the first argument; environment
    // overrides apply either way.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;

    tracing::info!(
        instance_id = %config.service.instance_id,
        bind_address = %config.listener.bind_address,
        max_attempts = config.retry.max_attempts,
        per_attempt_timeout_ms = config.retry.per_attempt_timeout_ms,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
