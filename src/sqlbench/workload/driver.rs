//! Shared fan-out/join loop for the bundled workloads.
//!
//! Every bundled workload runs the same outer discipline: N worker tasks
//! share the pool and claim iterations from a global counter until the
//! iteration budget, the time budget, or cancellation stops the run.
//! Cancellation is cooperative: workers check the token between
//! operations and never abandon an operation mid-flight, so a cancelled
//! run returns within one in-flight operation per worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::sqlbench::config::BenchConfig;
use crate::sqlbench::error::{BenchError, BenchResult};
use crate::sqlbench::workload::WorkloadSummary;

/// A single benchmark operation, executed repeatedly by every worker.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    async fn execute(&self, worker: usize, iteration: u64) -> Result<(), sqlx::Error>;
}

/// Budgets and error policy for one driver run.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub workload: &'static str,
    pub workers: usize,
    /// 0 means unbounded
    pub total_count: u64,
    pub total_time: Duration,
    pub ignore_error: bool,
    pub silence: bool,
    pub output_interval: Duration,
}

impl DriverOptions {
    pub fn from_config(workload: &'static str, workers: usize, config: &BenchConfig) -> Self {
        Self {
            workload,
            workers,
            total_count: config.total_count,
            total_time: config.total_time,
            ignore_error: config.ignore_error,
            silence: config.silence,
            output_interval: config.output_interval,
        }
    }
}

/// Fan out `options.workers` tasks over `operation` and join them into one
/// summary.
///
/// A non-ignored operation failure cancels a run-local child token so the
/// sibling workers stop promptly, then surfaces as the run's error; the
/// process-wide token is never cancelled from here.
pub async fn run_operations(
    options: DriverOptions,
    cancel: CancellationToken,
    operation: Arc<dyn Operation>,
) -> BenchResult<WorkloadSummary> {
    let started_at = Utc::now();
    let started = Instant::now();
    let deadline = started.checked_add(options.total_time);
    let issued = Arc::new(AtomicU64::new(0));
    let completed = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));
    let stop = cancel.child_token();

    let mut workers = JoinSet::new();
    for worker in 0..options.workers {
        let options = options.clone();
        let stop = stop.clone();
        let operation = Arc::clone(&operation);
        let issued = Arc::clone(&issued);
        let completed = Arc::clone(&completed);
        let errors = Arc::clone(&errors);
        workers.spawn(async move {
            worker_loop(
                worker, &options, &stop, deadline, operation, &issued, &completed, &errors,
            )
            .await
        });
    }

    let reporter = spawn_reporter(&options, started, &stop, &completed, &errors);

    let mut failure: Option<BenchError> = None;
    while let Some(joined) = workers.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(join_err) => Err(BenchError::worker_aborted(
                options.workload,
                join_err.to_string(),
            )),
        };
        if let Err(err) = result {
            if failure.is_none() {
                stop.cancel();
                failure = Some(err);
            }
        }
    }

    // run over; release the reporter
    stop.cancel();
    let _ = reporter.await;

    if let Some(err) = failure {
        return Err(err);
    }

    Ok(WorkloadSummary {
        workload: options.workload.to_string(),
        started_at,
        operations: completed.load(Ordering::Relaxed),
        errors: errors.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker: usize,
    options: &DriverOptions,
    stop: &CancellationToken,
    deadline: Option<Instant>,
    operation: Arc<dyn Operation>,
    issued: &AtomicU64,
    completed: &AtomicU64,
    errors: &AtomicU64,
) -> BenchResult<()> {
    loop {
        if stop.is_cancelled() {
            return Ok(());
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Ok(());
            }
        }

        // claim the next iteration under the global budget
        let iteration = issued.fetch_add(1, Ordering::Relaxed);
        if options.total_count > 0 && iteration >= options.total_count {
            return Ok(());
        }

        match operation.execute(worker, iteration).await {
            Ok(()) => {
                completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                if !options.ignore_error {
                    return Err(BenchError::workload(options.workload, err));
                }
                errors.fetch_add(1, Ordering::Relaxed);
                if !options.silence {
                    warn!(
                        "[{}] worker {worker}: operation failed: {err}",
                        options.workload
                    );
                }
            }
        }
    }
}

fn spawn_reporter(
    options: &DriverOptions,
    started: Instant,
    stop: &CancellationToken,
    completed: &Arc<AtomicU64>,
    errors: &Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    let interval = options.output_interval;
    let workload = options.workload;
    let stop = stop.clone();
    let completed = Arc::clone(completed);
    let errors = Arc::clone(errors);
    tokio::spawn(async move {
        if interval.is_zero() {
            return;
        }
        let Some(first_tick) = started.checked_add(interval) else {
            return;
        };
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let operations = completed.load(Ordering::Relaxed);
                    let failed = errors.load(Ordering::Relaxed);
                    let elapsed = started.elapsed().as_secs_f64();
                    let rate = if elapsed > 0.0 { operations as f64 / elapsed } else { 0.0 };
                    info!("[{workload}] {operations} operations, {failed} errors ({rate:.1} op/s)");
                }
            }
        }
    })
}
