//! Tests for the shared workload driver loop: budgets, error policy, and
//! cooperative cancellation, all against a mock operation (no database).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sqlbench::sqlbench::error::BenchError;
use sqlbench::sqlbench::workload::driver::{DriverOptions, Operation, run_operations};

/// Mock operation that counts executions and can fail on schedule.
struct MockOperation {
    executed: AtomicU64,
    delay: Duration,
    fail_every: Option<u64>,
}

impl MockOperation {
    fn new() -> Self {
        Self {
            executed: AtomicU64::new(0),
            delay: Duration::from_millis(1),
            fail_every: None,
        }
    }

    fn failing_every(mut self, every: u64) -> Self {
        self.fail_every = Some(every);
        self
    }

    fn count(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operation for MockOperation {
    async fn execute(&self, _worker: usize, iteration: u64) -> Result<(), sqlx::Error> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.executed.fetch_add(1, Ordering::SeqCst);
        if let Some(every) = self.fail_every {
            if (iteration + 1) % every == 0 {
                return Err(sqlx::Error::Protocol("injected failure".into()));
            }
        }
        Ok(())
    }
}

fn options(workers: usize) -> DriverOptions {
    DriverOptions {
        workload: "mock",
        workers,
        total_count: 0,
        total_time: Duration::MAX,
        ignore_error: false,
        silence: true,
        output_interval: Duration::ZERO,
    }
}

#[tokio::test(start_paused = true)]
async fn test_count_budget_executes_exactly_n_operations() {
    let operation = Arc::new(MockOperation::new());
    let summary = run_operations(
        DriverOptions {
            total_count: 100,
            ..options(4)
        },
        CancellationToken::new(),
        operation.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.operations, 100);
    assert_eq!(summary.errors, 0);
    assert_eq!(operation.count(), 100);
    assert!(!summary.cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_more_workers_than_budget() {
    let operation = Arc::new(MockOperation::new());
    let summary = run_operations(
        DriverOptions {
            total_count: 3,
            ..options(8)
        },
        CancellationToken::new(),
        operation.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.operations, 3);
    assert_eq!(operation.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_ignore_error_tallies_and_continues() {
    let operation = Arc::new(MockOperation::new().failing_every(10));
    let summary = run_operations(
        DriverOptions {
            total_count: 100,
            ignore_error: true,
            ..options(4)
        },
        CancellationToken::new(),
        operation.clone(),
    )
    .await
    .unwrap();

    // iterations 9, 19, ... 99 fail: ten errors, ninety successes
    assert_eq!(summary.errors, 10);
    assert_eq!(summary.operations, 90);
    assert_eq!(operation.count(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_first_error_aborts_the_run_without_ignore_error() {
    let operation = Arc::new(MockOperation::new().failing_every(5));
    let result = run_operations(
        // unbounded: only the error can end this run
        options(4),
        CancellationToken::new(),
        operation.clone(),
    )
    .await;

    match result {
        Err(BenchError::Workload { workload, .. }) => assert_eq!(workload, "mock"),
        other => panic!("expected a workload error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_ends_an_unbounded_run() {
    let operation = Arc::new(MockOperation::new());
    let summary = run_operations(
        DriverOptions {
            total_time: Duration::from_millis(100),
            ..options(2)
        },
        CancellationToken::new(),
        operation.clone(),
    )
    .await
    .unwrap();

    assert!(summary.operations > 0);
    assert!(!summary.cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_an_unbounded_run() {
    let operation = Arc::new(MockOperation::new());
    let cancel = CancellationToken::new();
    let run = tokio::spawn(run_operations(options(2), cancel.clone(), operation.clone()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let summary = run.await.unwrap().unwrap();
    assert!(summary.cancelled);
    assert!(summary.operations > 0);
}

// the spec scenario end to end: count 0, a short time budget, one signal
// at t=0 - the run must observe cancellation and return well inside the
// supervisor's grace period instead of being force-killed
#[tokio::test(start_paused = true)]
async fn test_signal_at_start_ends_the_run_inside_the_grace_period() {
    use sqlbench::sqlbench::shutdown::{ShutdownController, ShutdownOutcome, ShutdownSignal};
    use tokio::sync::{mpsc, oneshot};

    let controller = ShutdownController::new(Duration::from_secs(10));
    let (sig_tx, sig_rx) = mpsc::channel(4);
    let (done_tx, done_rx) = oneshot::channel();
    let supervisor = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.supervise(sig_rx, done_rx).await })
    };

    let operation = Arc::new(MockOperation::new());
    let run = tokio::spawn(run_operations(
        DriverOptions {
            total_time: Duration::from_secs(2),
            ..options(2)
        },
        controller.token(),
        operation.clone(),
    ));

    sig_tx.send(ShutdownSignal::Interrupt).await.unwrap();

    let summary = run.await.unwrap().unwrap();
    assert!(summary.cancelled);

    let _ = done_tx.send(());
    assert_eq!(
        supervisor.await.unwrap(),
        ShutdownOutcome::Graceful(ShutdownSignal::Interrupt)
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start_executes_nothing() {
    let operation = Arc::new(MockOperation::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_operations(options(4), cancel, operation.clone())
        .await
        .unwrap();
    assert_eq!(summary.operations, 0);
    assert_eq!(operation.count(), 0);
    assert!(summary.cancelled);
}
