//! Task Graph Registry
//!
//! Holds the DAG definition: task closures keyed by `TaskId` plus their declared
//! dependencies. Closures are type-erased behind `TaskFn` so tasks with
//! different future types can live in the same graph.
//!
//! The graph is built single-threaded before `run`; `plan` validates it and
//! precomputes the in-degree / children tables the executor schedules from.

use super::types::TaskId;
use crate::error::{Error, Result};

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Type alias for a thread-safe, asynchronous task closure.
/// It receives the run's cancellation token and resolves to `anyhow::Result<()>`.
pub type TaskFn = Arc<
    dyn Fn(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send
        + Sync,
>;

/// A registered node of the graph.
#[derive(Clone)]
pub struct TaskNode {
    pub id: TaskId,
    pub task: TaskFn,
    pub depends_on: Vec<TaskId>,
}

/// Scheduling tables derived from a validated graph. Indices follow insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    /// Number of unmet dependencies per node.
    pub in_degree: Vec<usize>,
    /// Nodes unblocked by each node's completion.
    pub children: Vec<Vec<usize>>,
    /// One valid topological order (Kahn, ties broken by insertion order).
    pub topological_order: Vec<usize>,
}

impl ExecutionPlan {
    /// Nodes with no dependencies, in insertion order.
    pub fn roots(&self) -> Vec<usize> {
        self.in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Default, Clone)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    index: HashMap<TaskId, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task.
    ///
    /// Dependencies may name tasks that are added later; unknown names are
    /// reported by [`TaskGraph::plan`]. Repeated dependencies are collapsed.
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
        if id.0.is_empty() {
            return Err(Error::InvalidArgument("task id must not be empty".into()));
        }
        if self.index.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("task {} already registered", id)));
        }

        let mut deps: Vec<TaskId> = Vec::with_capacity(depends_on.len());
        for dep in depends_on {
            let dep = TaskId::from(*dep);
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        let task_fn: TaskFn = Arc::new(move |token: CancellationToken| {
            Box::pin(task(token)) as Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        });

        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(TaskNode {
            id,
            task: task_fn,
            depends_on: deps,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(&TaskId::from(id))
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Validates the graph and derives the scheduling tables.
    ///
    /// Fails with `CycleOrDeadlock` if a dependency names an unknown task or
    /// if the edges do not form a DAG.
    pub fn plan(&self) -> Result<ExecutionPlan> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, node) in self.nodes.iter().enumerate() {
            for dep in &node.depends_on {
                let parent = *self.index.get(dep).ok_or_else(|| Error::CycleOrDeadlock {
                    detail: format!("task {} depends on unknown task {}", node.id, dep),
                })?;
                in_degree[i] += 1;
                children[parent].push(i);
            }
        }

        let mut remaining = in_degree.clone();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &child in &children[i] {
                remaining[child] -= 1;
                if remaining[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() != n {
            let stuck: Vec<String> = (0..n)
                .filter(|&i| remaining[i] > 0)
                .map(|i| self.nodes[i].id.0.clone())
                .collect();
            return Err(Error::CycleOrDeadlock {
                detail: format!("tasks never become ready: {}", stuck.join(", ")),
            });
        }

        Ok(ExecutionPlan {
            in_degree,
            children,
            topological_order: order,
        })
    }
}
