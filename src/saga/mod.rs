//! Saga Orchestrator Module
//!
//! In-process forward-then-compensate workflows. A `Saga` is an ordered list of
//! `SagaStep`s; each step's output becomes the next step's input. If a step
//! fails, the steps that already succeeded are undone in reverse order.
//!
//! There are no retries: an action that wants them retries internally.

pub mod orchestrator;
pub mod step;
pub mod types;

pub use orchestrator::{Saga, SagaFailure};
pub use step::SagaStep;
pub use types::{CompensationResult, SagaExecution, SagaStatus, StepResult, StepStatus};
