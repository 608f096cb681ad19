//! # sqlbench
//!
//! A control plane for benchmarking MySQL-compatible databases with
//! pluggable workloads.
//!
//! The crate owns exactly the machinery that every benchmark run needs and
//! no workload wants to reimplement:
//!
//! - **Connection management**: one shared pooled connection per run,
//!   sized to the configured concurrency, with the target database created
//!   on first use when it does not exist yet.
//! - **Signal-driven shutdown**: SIGHUP/SIGINT/SIGTERM/SIGQUIT all begin a
//!   graceful shutdown that cancels the run-wide token exactly once, then
//!   races run completion against a bounded grace period and any repeated
//!   signal before forcing the process to exit.
//! - **Workload dispatch**: one subcommand per workload kind, each handed
//!   the immutable run configuration, the shared pool, and the
//!   cancellation token through an explicit [`RuntimeEnvironment`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlbench::sqlbench::config::BenchConfig;
//! use sqlbench::sqlbench::connection::ConnectionManager;
//!
//! # async fn example() -> sqlbench::sqlbench::error::BenchResult<()> {
//! let config = Arc::new(BenchConfig::default().with_host("127.0.0.1").with_port(4000));
//! let mut manager = ConnectionManager::new(config);
//! let pool = manager.open().await?;
//! // hand `pool` to a workload...
//! manager.close().await;
//! # Ok(())
//! # }
//! ```

pub mod sqlbench;

// Re-export the main API at the crate root for easy access
pub use sqlbench::config::{BenchConfig, IsolationLevel};
pub use sqlbench::connection::ConnectionManager;
pub use sqlbench::error::{BenchError, BenchResult};
pub use sqlbench::runtime::RuntimeEnvironment;
pub use sqlbench::shutdown::{
    ShutdownController, ShutdownOutcome, ShutdownSignal, ShutdownState,
};
pub use sqlbench::workload::{Workload, WorkloadSummary};
