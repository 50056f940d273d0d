//! Executor subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch selects by X-Executor-Type
//!     → registry (case-insensitive name → implementation, built at boot)
//!     → http.rs or shell.rs
//!     → result.rs (tagged ExecutionResult back to the retry controller)
//! ```
//!
//! # Design Decisions
//! - Executors translate every recognized failure into an ExecutionResult;
//!   a Rust error out of `execute` is the unrecognized-failure path and is
//!   mapped to `ExecutorException` by the retry controller
//! - Executors honor the cancellation token at every suspension point and
//!   answer it with a transient `Timeout`
//! - Implementations share immutable config and are safe to invoke
//!   concurrently

pub mod http;
pub mod result;
pub mod shell;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::envelope::request::RequestEnvelope;
use crate::executor::result::ExecutionResult;

pub use http::HttpExecutor;
pub use shell::ShellExecutor;

/// Failure that escaped an executor before it could produce a result.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("internal executor failure: {0}")]
    Internal(String),
}

/// A named strategy that turns an envelope into an execution result.
pub trait Executor: Send + Sync {
    /// Stable lowercase tag used for selection and response headers.
    fn name(&self) -> &str;

    /// Run one attempt. Must honor `cancel` promptly with a transient
    /// `Timeout` result and must not panic on recognized failure modes.
    fn execute<'a>(
        &'a self,
        envelope: &'a RequestEnvelope,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ExecutionResult, ExecutorError>>;
}

/// Case-insensitive executor lookup, populated at boot and read-only
/// afterwards.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.name().to_ascii_lowercase(), executor);
    }

    /// Case-insensitive lookup by executor tag.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Registered tags, sorted for stable error messages.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }
}
