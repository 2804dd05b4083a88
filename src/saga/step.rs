//! Saga step definition.
//!
//! Actions and compensations are stored type-erased, the same way task
//! closures are in the DAG registry, so one saga can mix steps whose futures
//! have different concrete types.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Forward action: receives the previous step's output, returns its own.
pub type StepAction = Arc<dyn Fn(CancellationToken, Value) -> BoxFuture<anyhow::Result<Value>> + Send + Sync>;

/// Undo action: receives the output its step produced.
pub type Compensation = Arc<dyn Fn(CancellationToken, Value) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

#[derive(Clone)]
pub struct SagaStep {
    pub(crate) name: String,
    pub(crate) action: StepAction,
    pub(crate) compensate: Option<Compensation>,
    pub(crate) timeout: Option<Duration>,
}

impl SagaStep {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(CancellationToken, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let action: StepAction = Arc::new(move |token, input| Box::pin(action(token, input)));
        Self {
            name: name.into(),
            action,
            compensate: None,
            timeout: None,
        }
    }

    pub fn with_compensation<F, Fut>(mut self, compensate: F) -> Self
    where
        F: Fn(CancellationToken, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let compensate: Compensation =
            Arc::new(move |token, output| Box::pin(compensate(token, output)));
        self.compensate = Some(compensate);
        self
    }

    /// Bounds the action. A zero duration means no timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn has_compensation(&self) -> bool {
        self.compensate.is_some()
    }
}

impl std::fmt::Debug for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaStep")
            .field("name", &self.name)
            .field("has_compensation", &self.has_compensation())
            .field("timeout", &self.timeout)
            .finish()
    }
}
