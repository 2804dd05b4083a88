//! Error taxonomy shared by every subsystem.
//!
//! Collaborator and user errors are wrapped with the name of the failing unit
//! (task, shard, step) but kept as `#[source]`, so callers can still
//! `downcast_ref` to their own error types.

use std::time::Duration;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core subsystems.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An optimistic compare-and-set lost a race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input (empty ring, empty id, duplicate task, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A unit ran past its deadline.
    #[error("{unit} exceeded its deadline of {timeout:?}")]
    DeadlineExceeded { unit: String, timeout: Duration },

    /// The task graph has a cycle or references a task that was never added.
    #[error("cycle or deadlock in task graph: {detail}")]
    CycleOrDeadlock { detail: String },

    /// A DAG task returned an error. Displays the task's own error unchanged.
    #[error("{source}")]
    TaskFailed {
        task_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A per-shard search callback returned an error.
    #[error("shard {shard_id} search failed: {source}")]
    ShardFailed {
        shard_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A saga step failed. Displays the step's own error unchanged.
    #[error("{source}")]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// A saga step failed and at least one compensation failed as well.
    #[error("{source}; compensation of {compensation_step} failed: {compensation}")]
    CompensationFailed {
        #[source]
        source: Box<Error>,
        compensation_step: String,
        compensation: anyhow::Error,
    },

    /// Unclassified failure: transport errors, serialization, panics.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for `Cancelled` and `DeadlineExceeded`, and for a step or task
    /// failure caused by either.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled | Error::DeadlineExceeded { .. } => true,
            Error::StepFailed { source, .. }
            | Error::TaskFailed { source, .. }
            | Error::ShardFailed { source, .. } => source
                .downcast_ref::<Error>()
                .map(Error::is_cancelled)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub(crate) fn internal(message: impl std::fmt::Display) -> Self {
        Error::Internal(message.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {e}"))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Internal(format!("binary encoding: {e}"))
    }
}
