//! DAG Executor
//!
//! Runs the tasks of a [`TaskGraph`] in parallel, each as soon as all of its
//! dependencies have completed.
//!
//! ## Responsibilities
//! - **Scheduling**: Kahn-style in-degree countdown; roots start immediately.
//! - **Fail-fast**: After the first task error no new task is launched; tasks
//!   already running are drained and the first error is returned.
//! - **Events**: `started`, then `completed` or `failed`, per task, best-effort.
//!   Tasks hand events to a publisher task and never wait on the bus.
//! - **Cancellation**: Cancelling the caller's token cancels every task's token;
//!   `run` returns `Cancelled` once running tasks have acknowledged.

use super::events::EventBus;
use super::registry::{TaskFn, TaskGraph};
use super::types::*;
use crate::error::{Error, Result};
use crate::guard::spawn_guarded;

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Upper bound on a single event publish.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

/// Completion signal sent from a task back to the scheduling loop.
type Done = (usize, Result<()>);

type EventSender = Option<mpsc::UnboundedSender<TaskEvent>>;

pub struct DagExecutor {
    graph: TaskGraph,
    event_bus: Option<Arc<dyn EventBus>>,
    statuses: DashMap<TaskId, TaskStatus>,
}

impl DagExecutor {
    pub fn new() -> Self {
        Self {
            graph: TaskGraph::new(),
            event_bus: None,
            statuses: DashMap::new(),
        }
    }

    pub fn from_graph(graph: TaskGraph) -> Self {
        let executor = Self {
            graph,
            event_bus: None,
            statuses: DashMap::new(),
        };
        executor.reset_statuses();
        executor
    }

    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Registers a task. Must be called before `run`.
    pub fn add_task<F, Fut>(
        &mut self,
        id: impl Into<TaskId>,
        task: F,
        depends_on: &[&str],
    ) -> Result<()>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = id.into();
        self.graph.add_task(id.clone(), task, depends_on)?;
        self.statuses.insert(id, TaskStatus::Pending);
        Ok(())
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Status of a task in the current or most recent run.
    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.statuses.get(&TaskId::from(id)).map(|s| s.value().clone())
    }

    /// Statuses of all tasks, in registration order.
    pub fn statuses(&self) -> Vec<(TaskId, TaskStatus)> {
        self.graph
            .task_ids()
            .into_iter()
            .map(|id| {
                let status = self
                    .statuses
                    .get(&id)
                    .map(|s| s.value().clone())
                    .unwrap_or(TaskStatus::Pending);
                (id, status)
            })
            .collect()
    }

    /// Executes the graph to completion or first failure.
    pub async fn run(&self, ctx: &CancellationToken) -> Result<()> {
        let plan = self.graph.plan()?;
        self.reset_statuses();

        let total = self.graph.len();
        if total == 0 {
            return Ok(());
        }
        if ctx.is_cancelled() {
            self.skip_pending();
            return Err(Error::Cancelled);
        }

        tracing::info!("Running task graph with {} tasks", total);

        let token = ctx.child_token();
        let events = self.event_bus.clone().map(spawn_publisher);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Done>();
        let mut in_degree = plan.in_degree.clone();
        let mut active = 0usize;
        let mut completed = 0usize;
        let mut first_error: Option<Error> = None;

        for idx in plan.roots() {
            self.launch(idx, &token, &done_tx, &events);
            active += 1;
        }

        while active > 0 {
            let message = tokio::select! {
                biased;
                _ = ctx.cancelled(), if first_error.is_none() => {
                    tracing::warn!("Task graph cancelled with {} tasks running", active);
                    first_error = Some(Error::Cancelled);
                    token.cancel();
                    continue;
                }
                message = done_rx.recv() => message,
            };
            let Some((idx, outcome)) = message else {
                break;
            };
            active -= 1;
            let id = self.graph.nodes()[idx].id.clone();

            match outcome {
                Ok(()) => {
                    completed += 1;
                    self.statuses.insert(id.clone(), TaskStatus::Completed);
                    tracing::debug!("Task {} completed ({}/{})", id, completed, total);

                    if first_error.is_some() {
                        continue;
                    }
                    for &child in &plan.children[idx] {
                        in_degree[child] -= 1;
                        if in_degree[child] == 0 {
                            self.launch(child, &token, &done_tx, &events);
                            active += 1;
                        }
                    }
                }
                Err(e) => {
                    self.statuses.insert(
                        id.clone(),
                        TaskStatus::Failed {
                            error: e.to_string(),
                        },
                    );
                    if first_error.is_none() {
                        tracing::error!("Task {} failed, no further tasks will start: {}", id, e);
                        first_error = Some(e);
                    } else {
                        tracing::debug!("Task {} failed after the run already failed: {}", id, e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            self.skip_pending();
            return Err(e);
        }

        // Unreachable for a validated plan, kept as the live guard.
        if completed < total {
            self.skip_pending();
            return Err(Error::CycleOrDeadlock {
                detail: format!(
                    "no task running but only {} of {} completed",
                    completed, total
                ),
            });
        }

        tracing::info!("Task graph finished: {} tasks completed", completed);
        Ok(())
    }

    fn launch(
        &self,
        idx: usize,
        token: &CancellationToken,
        done_tx: &mpsc::UnboundedSender<Done>,
        events: &EventSender,
    ) {
        let node = &self.graph.nodes()[idx];
        let id = node.id.clone();
        let task: TaskFn = node.task.clone();
        let token = token.clone();
        let done_tx = done_tx.clone();
        let events = events.clone();

        self.statuses.insert(id.clone(), TaskStatus::Running);
        tracing::debug!("Launching task {}", id);

        tokio::spawn(async move {
            emit(&events, TaskEvent::new(TaskEventKind::Started, &id, None));

            let unit = format!("task {}", id);
            let task_id = id.0.clone();
            let task_token = token.clone();
            let outcome = spawn_guarded(&unit, async move {
                task(task_token)
                    .await
                    .map_err(|source| Error::TaskFailed { task_id, source })
            })
            .await;

            let event = match &outcome {
                Ok(()) => TaskEvent::new(TaskEventKind::Completed, &id, None),
                Err(e) => TaskEvent::new(TaskEventKind::Failed, &id, Some(e.to_string())),
            };
            emit(&events, event);

            let _ = done_tx.send((idx, outcome));
        });
    }

    fn reset_statuses(&self) {
        for id in self.graph.task_ids() {
            self.statuses.insert(id, TaskStatus::Pending);
        }
    }

    fn skip_pending(&self) {
        for mut entry in self.statuses.iter_mut() {
            if *entry.value() == TaskStatus::Pending {
                *entry.value_mut() = TaskStatus::Skipped;
            }
        }
    }
}

impl Default for DagExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Queues `event` for the publisher. Never waits.
fn emit(events: &EventSender, event: TaskEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Forwards queued events to `bus` in order, swallowing every failure.
///
/// The task ends once every sender is gone and the queue is drained, which
/// may be after `run` has returned.
fn spawn_publisher(bus: Arc<dyn EventBus>) -> mpsc::UnboundedSender<TaskEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<TaskEvent>();
    let publish_token = CancellationToken::new();

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let topic = event.kind.topic();
            let payload = match serde_json::to_value(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Failed to encode {} event: {}", topic, e);
                    continue;
                }
            };

            let publish = bus.publish(&publish_token, topic, payload);
            match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!("Dropped {} event for {}: {}", topic, event.task_id, e)
                }
                Err(_) => {
                    tracing::debug!("Timed out publishing {} event for {}", topic, event.task_id)
                }
            }
        }
    });

    tx
}
