//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routes, shared state)
//!     → /ping, /metrics answered locally
//!     → /api/{*path} handed to dispatch::controller
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
