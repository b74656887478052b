use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;

use super::{CompositeStoppable, Stoppable, StoppableExecutor};
use crate::testing::eventually;
use crate::utils::error::{DispatchError, StopError};

fn explode(reason: &str) {
    panic!("{reason}");
}

struct CountingStoppable {
    stops: AtomicUsize,
}

impl CountingStoppable {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            stops: AtomicUsize::new(0),
        })
    }
}

impl Stoppable for CountingStoppable {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

struct FailingStoppable;

impl Stoppable for FailingStoppable {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        Box::pin(async {
            Err(StopError::Component {
                component: "failing".to_string(),
                reason: "boom".to_string(),
            })
        })
    }
}

struct PanickingStoppable;

impl Stoppable for PanickingStoppable {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        Box::pin(async {
            explode("stop exploded");
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_composite_stops_every_part_in_order() {
    let first = CountingStoppable::new();
    let second = CountingStoppable::new();

    CompositeStoppable::new()
        .add("first", first.clone())
        .add("second", second.clone())
        .stop()
        .await
        .expect("stop");

    assert_eq!(first.stops.load(Ordering::SeqCst), 1);
    assert_eq!(second.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_composite_continues_past_failures_and_aggregates_them() {
    let last = CountingStoppable::new();

    let err = CompositeStoppable::new()
        .add("failing", Arc::new(FailingStoppable))
        .add("panicking", Arc::new(PanickingStoppable))
        .add("last", last.clone())
        .stop()
        .await
        .expect_err("two parts fail");

    assert_eq!(last.stops.load(Ordering::SeqCst), 1);
    match err {
        StopError::Composite(failures) => {
            assert_eq!(failures.len(), 2);
            assert!(failures[1].to_string().contains("panicking"));
        }
        other => panic!("expected composite error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_composite_with_single_failure_returns_it_directly() {
    let err = CompositeStoppable::new()
        .add("failing", Arc::new(FailingStoppable))
        .stop()
        .await
        .expect_err("one part fails");

    assert!(matches!(err, StopError::Component { .. }));
}

#[tokio::test]
async fn test_executor_joins_tasks_and_rejects_new_ones() {
    let executor = StoppableExecutor::new("test executor");
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let done = Arc::new(AtomicUsize::new(0));

    let seen = done.clone();
    executor
        .spawn(async move {
            let _ = rx.await;
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn");

    tx.send(()).expect("task is waiting");
    executor.stop().await.expect("stop");
    assert_eq!(done.load(Ordering::SeqCst), 1);

    let err = executor.spawn(async {}).expect_err("stopped");
    assert!(matches!(err, DispatchError::Stopped(name) if name == "test executor"));

    // a second stop has nothing left to join
    executor.stop().await.expect("second stop");
}

#[tokio::test]
async fn test_executor_reports_panicked_tasks() {
    let executor = StoppableExecutor::new("panicky");
    executor
        .spawn(async { explode("task exploded") })
        .expect("spawn");

    let err = executor.stop().await.expect_err("panicked task");
    assert!(err.to_string().contains("panicky"));
}

/// Flags when the task owning it is dropped.
struct DropFlag(Arc<AtomicUsize>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_executor_aborts_tasks_that_outlive_the_join_timeout() {
    let executor = StoppableExecutor::new("stuck").with_join_timeout(Duration::from_millis(50));
    let dropped = Arc::new(AtomicUsize::new(0));
    let flag = DropFlag(dropped.clone());
    executor
        .spawn(async move {
            let _flag = flag;
            std::future::pending::<()>().await;
        })
        .expect("spawn");

    let err = tokio::time::timeout(Duration::from_secs(2), executor.stop())
        .await
        .expect("stop returns despite the stuck task")
        .expect_err("stuck task is reported");
    assert!(err.to_string().contains("aborted"));

    eventually(|| dropped.load(Ordering::SeqCst) == 1).await;
}
