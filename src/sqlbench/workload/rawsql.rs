//! Raw-statement runner: executes operator-supplied SQL files as the
//! workload, one file per iteration, round-robin.
//!
//! Files may contain several statements; they are sent through
//! [`sqlx::raw_sql`], which executes the whole batch.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use sqlx::mysql::MySqlPool;

use crate::sqlbench::error::{BenchError, BenchResult};
use crate::sqlbench::runtime::RuntimeEnvironment;
use crate::sqlbench::workload::driver::{DriverOptions, Operation, run_operations};
use crate::sqlbench::workload::{Workload, WorkloadSummary};

const NAME: &str = "rawsql";

#[derive(Debug, Clone)]
struct SqlScript {
    name: String,
    sql: String,
}

#[derive(Debug)]
pub struct RawSqlWorkload {
    scripts: Arc<Vec<SqlScript>>,
}

impl RawSqlWorkload {
    /// Load the given SQL files up front so an unreadable script is a
    /// startup error, not a mid-run surprise.
    pub fn load(files: &[PathBuf]) -> BenchResult<Self> {
        if files.is_empty() {
            return Err(BenchError::config("rawsql needs at least one SQL file"));
        }
        let mut scripts = Vec::with_capacity(files.len());
        for file in files {
            let sql = std::fs::read_to_string(file)
                .map_err(|err| BenchError::io(format!("read {}", file.display()), err))?;
            if sql.trim().is_empty() {
                return Err(BenchError::config(format!(
                    "SQL file {} is empty",
                    file.display()
                )));
            }
            scripts.push(SqlScript {
                name: file.display().to_string(),
                sql,
            });
        }
        Ok(Self {
            scripts: Arc::new(scripts),
        })
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }
}

#[async_trait]
impl Workload for RawSqlWorkload {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, env: &RuntimeEnvironment) -> BenchResult<WorkloadSummary> {
        info!("[{NAME}] running {} script(s)", self.scripts.len());
        let options = DriverOptions::from_config(NAME, env.config().threads, env.config());
        let operation = Arc::new(ScriptExecution {
            pool: env.pool().clone(),
            scripts: Arc::clone(&self.scripts),
        });
        run_operations(options, env.cancel_token(), operation).await
    }
}

struct ScriptExecution {
    pool: MySqlPool,
    scripts: Arc<Vec<SqlScript>>,
}

#[async_trait]
impl Operation for ScriptExecution {
    async fn execute(&self, _worker: usize, iteration: u64) -> Result<(), sqlx::Error> {
        let script = &self.scripts[(iteration % self.scripts.len() as u64) as usize];
        log::debug!("[{NAME}] executing {}", script.name);
        sqlx::raw_sql(&script.sql).execute(&self.pool).await?;
        Ok(())
    }
}
