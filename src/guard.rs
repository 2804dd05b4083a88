//! Panic isolation for user-supplied closures.
//!
//! Tasks, steps, compensations and shard callbacks are arbitrary user code. Each
//! one is driven inside its own tokio task, so a panic unwinds only that task and
//! surfaces here as a `JoinError`, which is turned into `Error::Internal`.

use crate::error::{Error, Result};
use std::any::Any;
use std::future::Future;

/// Runs `fut` on its own tokio task and flattens panics into `Error::Internal`.
///
/// `unit` names the closure in logs and in the resulting error message.
pub async fn spawn_guarded<F, T>(unit: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            let message = panic_message(join_error.into_panic());
            tracing::error!("Recovered panic in {}: {}", unit, message);
            Err(Error::Internal(format!("panic in {unit}: {message}")))
        }
        Err(join_error) => {
            tracing::warn!("{} was aborted before completion", unit);
            Err(Error::internal(format!("{unit} aborted: {join_error}")))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
