//! Explicitly constructed per-run environment.
//!
//! Everything a workload needs travels together here instead of living in
//! ambient globals, so each test can build an isolated instance.

use std::sync::Arc;

use sqlx::MySqlPool;
use tokio_util::sync::CancellationToken;

use crate::sqlbench::config::BenchConfig;

/// The shared state of one benchmark run: the immutable configuration, the
/// single pooled connection handle, and the run-wide cancellation token.
///
/// Cheap to clone; all clones observe the same pool and the same token.
#[derive(Clone)]
pub struct RuntimeEnvironment {
    config: Arc<BenchConfig>,
    pool: MySqlPool,
    cancel: CancellationToken,
}

impl RuntimeEnvironment {
    pub fn new(config: Arc<BenchConfig>, pool: MySqlPool, cancel: CancellationToken) -> Self {
        Self {
            config,
            pool,
            cancel,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// A clone of the run-wide cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
