//! Analytical workload: aggregate scans over a seeded fact table, driven
//! by the analytical thread count.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use sqlx::mysql::MySqlPool;
use sqlx::{Executor, MySql, QueryBuilder};

use crate::sqlbench::error::{BenchError, BenchResult};
use crate::sqlbench::runtime::RuntimeEnvironment;
use crate::sqlbench::workload::driver::{DriverOptions, Operation, run_operations};
use crate::sqlbench::workload::{Workload, WorkloadSummary};

const NAME: &str = "tpch";
const PARTS: u64 = 200;
const SEED_BATCH: u64 = 500;

const CREATE_LINEITEM: &str = "\
CREATE TABLE IF NOT EXISTS sqlbench_lineitem (
    id BIGINT NOT NULL,
    part_id INT NOT NULL,
    quantity INT NOT NULL,
    price_cents BIGINT NOT NULL,
    PRIMARY KEY (id),
    KEY idx_part (part_id)
)";

pub struct TpchWorkload {
    rows: u64,
}

impl TpchWorkload {
    pub fn new(rows: u64) -> Self {
        Self { rows: rows.max(1) }
    }

    pub(crate) async fn prepare(&self, env: &RuntimeEnvironment) -> BenchResult<()> {
        let pool = env.pool();
        if env.config().drop_data {
            info!("[{NAME}] dropping existing data");
            pool.execute("DROP TABLE IF EXISTS sqlbench_lineitem")
                .await
                .map_err(|err| BenchError::workload(NAME, err))?;
        }
        pool.execute(CREATE_LINEITEM)
            .await
            .map_err(|err| BenchError::workload(NAME, err))?;

        let mut next_id = 0u64;
        while next_id < self.rows {
            let batch_end = (next_id + SEED_BATCH).min(self.rows);
            let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT IGNORE INTO sqlbench_lineitem (id, part_id, quantity, price_cents) ",
            );
            builder.push_values(next_id..batch_end, |mut row, id| {
                row.push_bind(id as i64)
                    .push_bind((id % PARTS) as i64)
                    .push_bind((id % 50 + 1) as i64)
                    .push_bind((id.wrapping_mul(37) % 10_000 + 100) as i64);
            });
            builder
                .build()
                .execute(pool)
                .await
                .map_err(|err| BenchError::workload(NAME, err))?;
            next_id = batch_end;
        }
        info!("[{NAME}] prepared {} fact rows", self.rows);
        Ok(())
    }
}

#[async_trait]
impl Workload for TpchWorkload {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, env: &RuntimeEnvironment) -> BenchResult<WorkloadSummary> {
        self.prepare(env).await?;
        let options = DriverOptions::from_config(NAME, env.config().ac_threads, env.config());
        let operation = Arc::new(AggregateScan {
            pool: env.pool().clone(),
        });
        run_operations(options, env.cancel_token(), operation).await
    }
}

pub(crate) struct AggregateScan {
    pub(crate) pool: MySqlPool,
}

#[async_trait]
impl Operation for AggregateScan {
    async fn execute(&self, _worker: usize, iteration: u64) -> Result<(), sqlx::Error> {
        match query_for(iteration) {
            0 => {
                sqlx::query(
                    "SELECT part_id, SUM(quantity) AS total_qty, AVG(price_cents) AS avg_price \
                     FROM sqlbench_lineitem GROUP BY part_id ORDER BY total_qty DESC LIMIT 10",
                )
                .fetch_all(&self.pool)
                .await?;
            }
            1 => {
                sqlx::query(
                    "SELECT COUNT(*) AS cnt, MIN(price_cents) AS lo, MAX(price_cents) AS hi \
                     FROM sqlbench_lineitem WHERE quantity > ?",
                )
                .bind((iteration % 50) as i64)
                .fetch_all(&self.pool)
                .await?;
            }
            _ => {
                let lo = (iteration % 5_000) as i64;
                sqlx::query(
                    "SELECT part_id, COUNT(*) AS cnt FROM sqlbench_lineitem \
                     WHERE price_cents BETWEEN ? AND ? GROUP BY part_id",
                )
                .bind(lo)
                .bind(lo + 2_000)
                .fetch_all(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}

fn query_for(iteration: u64) -> u64 {
    iteration % 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_rotation_covers_all_shapes() {
        let picked: std::collections::HashSet<u64> = (0..9).map(query_for).collect();
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_zero_rows_is_clamped() {
        let workload = TpchWorkload::new(0);
        assert_eq!(workload.rows, 1);
    }
}
