//! Executor Module Tests
//!
//! ## Test Scopes
//! - **Planning**: Graph validation, cycle and unknown-dependency detection.
//! - **Scheduling**: Dependency ordering, parallel roots, event traces.
//! - **Failure**: First-error propagation, recovered panics, cancellation.

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::executor::types::{
        TOPIC_TASK_COMPLETED, TOPIC_TASK_FAILED, TOPIC_TASK_STARTED,
    };
    use crate::executor::{BroadcastEventBus, DagExecutor, EventBus, TaskGraph, TaskStatus};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tokio_util::sync::CancellationToken;

    /// Records `(topic, task_id)` for every publish, in call order.
    #[derive(Default)]
    struct RecordingBus {
        events: Mutex<Vec<(String, String)>>,
    }

    impl RecordingBus {
        fn trace(&self) -> Vec<(String, String)> {
            self.events.lock().clone()
        }

        /// Events are published after `run` may have returned.
        async fn wait_for(&self, count: usize) {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            while self.events.lock().len() < count {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "only {} of {count} events arrived",
                    self.events.lock().len()
                );
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        fn position(&self, topic: &str, task: &str) -> usize {
            self.trace()
                .iter()
                .position(|(t, id)| t == topic && id == task)
                .unwrap_or_else(|| panic!("no {topic} event for {task}"))
        }
    }

    #[async_trait]
    impl EventBus for RecordingBus {
        async fn publish(
            &self,
            _ctx: &CancellationToken,
            topic: &str,
            payload: serde_json::Value,
        ) -> anyhow::Result<()> {
            let task_id = payload["task_id"].as_str().unwrap_or_default().to_string();
            self.events.lock().push((topic.to_string(), task_id));
            Ok(())
        }
    }

    /// Takes far longer than any task to acknowledge a publish.
    struct StalledBus;

    #[async_trait]
    impl EventBus for StalledBus {
        async fn publish(
            &self,
            _ctx: &CancellationToken,
            _topic: &str,
            _payload: serde_json::Value,
        ) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    struct FailingBus;

    #[async_trait]
    impl EventBus for FailingBus {
        async fn publish(
            &self,
            _ctx: &CancellationToken,
            topic: &str,
            _payload: serde_json::Value,
        ) -> anyhow::Result<()> {
            anyhow::bail!("broker unreachable for {topic}")
        }
    }

    fn noop(executor: &mut DagExecutor, id: &str, deps: &[&str]) {
        executor
            .add_task(id, |_token| async { Ok(()) }, deps)
            .unwrap();
    }

    // ============================================================
    // PLANNING TESTS
    // ============================================================

    #[test]
    fn test_plan_tables_for_diamond() {
        // ARRANGE: A -> {B, C} -> D
        let mut graph = TaskGraph::new();
        graph.add_task("A", |_t| async { Ok(()) }, &[]).unwrap();
        graph.add_task("B", |_t| async { Ok(()) }, &["A"]).unwrap();
        graph.add_task("C", |_t| async { Ok(()) }, &["A"]).unwrap();
        graph.add_task("D", |_t| async { Ok(()) }, &["B", "C"]).unwrap();

        // ACT
        let plan = graph.plan().unwrap();

        // ASSERT
        assert_eq!(plan.in_degree, vec![0, 1, 1, 2]);
        assert_eq!(plan.children[0], vec![1, 2]);
        assert_eq!(plan.roots(), vec![0]);
        assert_eq!(plan.topological_order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_repeated_dependencies_are_collapsed() {
        let mut graph = TaskGraph::new();
        graph.add_task("A", |_t| async { Ok(()) }, &[]).unwrap();
        graph.add_task("B", |_t| async { Ok(()) }, &["A", "A"]).unwrap();

        assert_eq!(graph.nodes()[1].depends_on.len(), 1);
        assert_eq!(graph.plan().unwrap().in_degree, vec![0, 1]);
    }

    #[test]
    fn test_duplicate_and_empty_ids_rejected() {
        // ARRANGE
        let mut graph = TaskGraph::new();
        graph.add_task("A", |_t| async { Ok(()) }, &[]).unwrap();

        // ACT & ASSERT: neither registration changes the graph
        let dup = graph.add_task("A", |_t| async { Ok(()) }, &[]);
        assert!(matches!(dup, Err(Error::InvalidArgument(_))));

        let empty = graph.add_task("", |_t| async { Ok(()) }, &[]);
        assert!(matches!(empty, Err(Error::InvalidArgument(_))));
        assert_eq!(graph.len(), 1);
        assert!(graph.contains("A"));
    }

    #[test]
    fn test_unknown_dependency_detected() {
        let mut graph = TaskGraph::new();
        graph.add_task("B", |_t| async { Ok(()) }, &["ghost"]).unwrap();

        match graph.plan() {
            Err(Error::CycleOrDeadlock { detail }) => assert!(detail.contains("ghost")),
            other => panic!("expected CycleOrDeadlock, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_cycle_detected_before_any_task_runs() {
        // ARRANGE: a runnable root next to the cycle X <-> Y
        let runs = Arc::new(AtomicUsize::new(0));
        let mut executor = DagExecutor::new();

        for (id, dep) in [("root", None), ("X", Some("Y")), ("Y", Some("X"))] {
            let runs = runs.clone();
            let deps: Vec<&str> = dep.into_iter().collect();
            executor
                .add_task(
                    id,
                    move |_t| {
                        let runs = runs.clone();
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    },
                    &deps,
                )
                .unwrap();
        }

        // ACT
        let result = executor.run(&CancellationToken::new()).await;

        // ASSERT: rejected up front, even the root never ran
        match result {
            Err(Error::CycleOrDeadlock { detail }) => {
                assert!(detail.contains('X') && detail.contains('Y'));
            }
            other => panic!("expected CycleOrDeadlock, got {:?}", other),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    // ============================================================
    // SCHEDULING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_empty_graph_succeeds() {
        let executor = DagExecutor::new();
        executor.run(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_diamond_event_trace_respects_dependencies() {
        // ARRANGE
        let bus = Arc::new(RecordingBus::default());
        let mut executor = DagExecutor::new().with_event_bus(bus.clone());
        noop(&mut executor, "A", &[]);
        noop(&mut executor, "B", &["A"]);
        noop(&mut executor, "C", &["A"]);
        noop(&mut executor, "D", &["B", "C"]);

        // ACT
        executor.run(&CancellationToken::new()).await.unwrap();
        bus.wait_for(8).await;

        // ASSERT: no task starts before all of its dependencies completed
        assert_eq!(bus.trace().len(), 8);
        let a_done = bus.position(TOPIC_TASK_COMPLETED, "A");
        assert!(bus.position(TOPIC_TASK_STARTED, "A") < a_done);
        assert!(bus.position(TOPIC_TASK_STARTED, "B") > a_done);
        assert!(bus.position(TOPIC_TASK_STARTED, "C") > a_done);

        let d_started = bus.position(TOPIC_TASK_STARTED, "D");
        assert!(d_started > bus.position(TOPIC_TASK_COMPLETED, "B"));
        assert!(d_started > bus.position(TOPIC_TASK_COMPLETED, "C"));

        for (_, status) in executor.statuses() {
            assert_eq!(status, TaskStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_independent_roots_run_in_parallel() {
        // ARRANGE: both roots must be running at once to get past the barrier
        let barrier = Arc::new(Barrier::new(2));
        let mut executor = DagExecutor::new();
        for id in ["left", "right"] {
            let barrier = barrier.clone();
            executor
                .add_task(
                    id,
                    move |_t| {
                        let barrier = barrier.clone();
                        async move {
                            barrier.wait().await;
                            Ok(())
                        }
                    },
                    &[],
                )
                .unwrap();
        }

        // ACT
        let result =
            tokio::time::timeout(Duration::from_secs(2), executor.run(&CancellationToken::new()))
                .await
                .expect("roots did not run concurrently");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_bus_delivers_task_events() {
        let bus = Arc::new(BroadcastEventBus::new(16));
        let mut rx = bus.subscribe();
        let mut executor = DagExecutor::new().with_event_bus(bus.clone());
        noop(&mut executor, "only", &[]);

        executor.run(&CancellationToken::new()).await.unwrap();

        let started = rx.recv().await.unwrap();
        assert_eq!(started.topic, TOPIC_TASK_STARTED);
        assert_eq!(started.payload["task_id"], "only");
        assert_eq!(started.payload["kind"], "started");

        let completed = rx.recv().await.unwrap();
        assert_eq!(completed.topic, TOPIC_TASK_COMPLETED);
        assert!(completed.payload.get("error").is_none());
    }

    #[tokio::test]
    async fn test_publish_failures_do_not_affect_run() {
        let mut executor = DagExecutor::new().with_event_bus(Arc::new(FailingBus));
        noop(&mut executor, "A", &[]);
        noop(&mut executor, "B", &["A"]);

        executor.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(executor.status("B"), Some(TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_slow_bus_does_not_delay_tasks() {
        // ARRANGE: a dependency chain a -> b -> c behind a bus that never answers in time
        let mut executor = DagExecutor::new().with_event_bus(Arc::new(StalledBus));
        noop(&mut executor, "a", &[]);
        noop(&mut executor, "b", &["a"]);
        noop(&mut executor, "c", &["b"]);

        // ACT
        let started = std::time::Instant::now();
        executor.run(&CancellationToken::new()).await.unwrap();

        // ASSERT: run time is independent of publish latency
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "run took {:?}",
            started.elapsed()
        );
        assert_eq!(executor.status("c"), Some(TaskStatus::Completed));
    }

    // ============================================================
    // FAILURE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_first_error_stops_new_launches_and_drains_siblings() {
        // ARRANGE: "child" waits on a slow sibling of the failing task
        let bus = Arc::new(RecordingBus::default());
        let child_runs = Arc::new(AtomicUsize::new(0));
        let mut executor = DagExecutor::new().with_event_bus(bus.clone());

        executor
            .add_task("fails", |_t| async { Err(anyhow::anyhow!("disk full")) }, &[])
            .unwrap();
        executor
            .add_task(
                "slow-sibling",
                |_t| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                },
                &[],
            )
            .unwrap();
        {
            let child_runs = child_runs.clone();
            executor
                .add_task(
                    "child",
                    move |_t| {
                        let child_runs = child_runs.clone();
                        async move {
                            child_runs.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    },
                    &["slow-sibling"],
                )
                .unwrap();
        }

        // ACT
        let err = executor.run(&CancellationToken::new()).await.unwrap_err();

        // ASSERT: first error reported, running sibling drained, child never launched
        match &err {
            Error::TaskFailed { task_id, source } => {
                assert_eq!(task_id, "fails");
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("expected TaskFailed, got {:?}", other),
        }

        assert_eq!(child_runs.load(Ordering::SeqCst), 0);
        assert_eq!(executor.status("slow-sibling"), Some(TaskStatus::Completed));
        assert_eq!(executor.status("child"), Some(TaskStatus::Skipped));
        assert!(matches!(executor.status("fails"), Some(TaskStatus::Failed { .. })));
        // fails: started + failed, slow-sibling: started + completed
        bus.wait_for(4).await;
        bus.position(TOPIC_TASK_FAILED, "fails");
    }

    #[tokio::test]
    async fn test_task_panic_becomes_internal_error() {
        // ARRANGE
        let mut executor = DagExecutor::new();
        let should_panic = true;
        executor
            .add_task(
                "crashy",
                move |_t| async move {
                    if should_panic {
                        panic!("worker crashed");
                    }
                    Ok(())
                },
                &[],
            )
            .unwrap();

        // ACT
        let err = executor.run(&CancellationToken::new()).await.unwrap_err();

        // ASSERT
        match err {
            Error::Internal(message) => {
                assert!(message.contains("crashy"));
                assert!(message.contains("worker crashed"));
            }
            other => panic!("expected Internal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_waits_for_running_tasks() {
        let acknowledged = Arc::new(AtomicUsize::new(0));
        let mut executor = DagExecutor::new();
        {
            let acknowledged = acknowledged.clone();
            executor
                .add_task(
                    "long",
                    move |token| {
                        let acknowledged = acknowledged.clone();
                        async move {
                            token.cancelled().await;
                            acknowledged.fetch_add(1, Ordering::SeqCst);
                            Err(anyhow::anyhow!("stopped"))
                        }
                    },
                    &[],
                )
                .unwrap();
        }
        noop(&mut executor, "after", &["long"]);

        // ACT: cancel while "long" is running
        let ctx = CancellationToken::new();
        let trigger = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor.run(&ctx).await.unwrap_err();

        // ASSERT: run returned only after "long" saw the cancellation
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(acknowledged.load(Ordering::SeqCst), 1);
        assert_eq!(executor.status("after"), Some(TaskStatus::Skipped));
    }

    #[tokio::test]
    async fn test_pre_cancelled_context_runs_nothing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut executor = DagExecutor::new();
        let counter = runs.clone();
        executor
            .add_task(
                "A",
                move |_t| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                &[],
            )
            .unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = executor.run(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(executor.status("A"), Some(TaskStatus::Skipped));
    }
}
