//! Pluggable benchmark workloads.
//!
//! A workload receives the shared [`RuntimeEnvironment`] and runs until its
//! own stop condition fires: the time budget, the iteration budget, or
//! cancellation of the run-wide token. The bundled workloads all share the
//! fan-out/join discipline in [`driver`]; external workloads only need to
//! implement [`Workload`].

pub mod ch;
pub mod driver;
pub mod rawsql;
pub mod tpcc;
pub mod tpch;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sqlbench::error::BenchResult;
use crate::sqlbench::runtime::RuntimeEnvironment;

/// A benchmark workload kind.
///
/// Implementations must honor `ignore_error`/`silence` from the shared
/// configuration, and must return within one in-flight operation of
/// observing cancellation so the grace-period contract stays meaningful.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Workload kind name used in summaries and logs.
    fn name(&self) -> &'static str;

    /// Run to completion, cancellation, or error.
    async fn run(&self, env: &RuntimeEnvironment) -> BenchResult<WorkloadSummary>;
}

/// Result of one workload run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadSummary {
    /// Workload kind that produced this summary
    pub workload: String,
    /// When the measured phase started
    pub started_at: DateTime<Utc>,
    /// Operations completed successfully
    pub operations: u64,
    /// Operation failures tolerated under `--ignore-error`
    pub errors: u64,
    /// Wall time of the measured phase
    pub elapsed: Duration,
    /// Whether the run ended because the run-wide token was cancelled
    pub cancelled: bool,
}

impl WorkloadSummary {
    /// Completed operations per wall-clock second.
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.operations as f64 / secs
        } else {
            0.0
        }
    }

    /// Merge concurrently-collected partial summaries (the mixed workload
    /// runs its transactional and analytical halves side by side).
    pub fn combined(workload: impl Into<String>, parts: &[WorkloadSummary]) -> WorkloadSummary {
        let workload = workload.into();
        let started_at = parts
            .iter()
            .map(|p| p.started_at)
            .min()
            .unwrap_or_else(Utc::now);
        WorkloadSummary {
            workload,
            started_at,
            operations: parts.iter().map(|p| p.operations).sum(),
            errors: parts.iter().map(|p| p.errors).sum(),
            elapsed: parts.iter().map(|p| p.elapsed).max().unwrap_or_default(),
            cancelled: parts.iter().any(|p| p.cancelled),
        }
    }
}

impl fmt::Display for WorkloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} operations, {} errors in {:.1?} ({:.1} op/s)",
            self.workload,
            self.operations,
            self.errors,
            self.elapsed,
            self.ops_per_sec()
        )?;
        if self.cancelled {
            write!(f, ", stopped by cancellation")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(operations: u64, errors: u64, elapsed_secs: u64, cancelled: bool) -> WorkloadSummary {
        WorkloadSummary {
            workload: "test".to_string(),
            started_at: Utc::now(),
            operations,
            errors,
            elapsed: Duration::from_secs(elapsed_secs),
            cancelled,
        }
    }

    #[test]
    fn test_summary_display() {
        let rendered = format!("{}", summary(100, 2, 10, false));
        assert!(rendered.contains("100 operations"));
        assert!(rendered.contains("2 errors"));
        assert!(rendered.contains("10.0 op/s"));
        assert!(!rendered.contains("cancellation"));

        let rendered = format!("{}", summary(5, 0, 1, true));
        assert!(rendered.contains("stopped by cancellation"));
    }

    #[test]
    fn test_combined_sums_and_takes_longest() {
        let combined = WorkloadSummary::combined(
            "ch",
            &[summary(100, 1, 10, false), summary(40, 2, 12, true)],
        );
        assert_eq!(combined.workload, "ch");
        assert_eq!(combined.operations, 140);
        assert_eq!(combined.errors, 3);
        assert_eq!(combined.elapsed, Duration::from_secs(12));
        assert!(combined.cancelled);
    }

    #[test]
    fn test_summary_serializes() {
        let json = serde_json::to_string(&summary(7, 0, 3, false)).unwrap();
        assert!(json.contains("\"operations\":7"));
    }
}
