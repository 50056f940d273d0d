//! Remote Executor Gateway Library
//!
//! A request-forwarding gateway built with Tokio and Axum. Inbound
//! requests on the `/api` catch-all route are wrapped in an immutable
//! envelope, validated, and dispatched through a named executor (HTTP
//! forwarder or allowlisted remote-shell simulator) under a uniform
//! retry, cancellation, and metrics pipeline.

// Core pipeline
pub mod clock;
pub mod dispatch;
pub mod envelope;
pub mod executor;
pub mod resilience;

// Boundary
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
