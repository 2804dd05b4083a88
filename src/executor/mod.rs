//! DAG Task Executor Module
//!
//! Runs a set of user-supplied async tasks in parallel, respecting declared
//! dependencies between them.
//!
//! ## Architecture Overview
//! 1. **Registration**: Tasks are added to a `TaskGraph` before the run starts.
//! 2. **Planning**: `TaskGraph::plan` rejects unknown dependencies and cycles up
//!    front (Kahn's algorithm) and produces in-degree / children tables.
//! 3. **Execution**: `DagExecutor::run` launches roots, then launches each child
//!    once its last parent completes. The first failure stops new launches.
//! 4. **Events**: Every task transition is published to an optional `EventBus`
//!    on the `dag.task.*` topics. Publishing is best-effort.
//!
//! ## Submodules
//! - **`types`**: Task identifiers, statuses and event payloads.
//! - **`registry`**: The graph definition and its validated execution plan.
//! - **`events`**: The event bus trait and an in-process broadcast implementation.
//! - **`executor`**: The scheduling loop.

pub mod events;
pub mod executor;
pub mod registry;
pub mod types;

pub use events::{BroadcastEventBus, EventBus, PublishedEvent};
pub use executor::DagExecutor;
pub use registry::{ExecutionPlan, TaskFn, TaskGraph, TaskNode};
pub use types::{TaskEvent, TaskEventKind, TaskId, TaskStatus};

#[cfg(test)]
mod tests;
