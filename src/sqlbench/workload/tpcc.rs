//! Transactional workload: short read-modify-write transactions against a
//! stock table partitioned by warehouse.
//!
//! The control plane treats realistic benchmark SQL as a collaborator
//! concern; this loop keeps the transaction small so the harness itself
//! (pooling, budgets, cancellation, error policy) is what gets exercised.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use sqlx::mysql::MySqlPool;
use sqlx::{Executor, MySql, QueryBuilder, Row};

use crate::sqlbench::error::{BenchError, BenchResult};
use crate::sqlbench::runtime::RuntimeEnvironment;
use crate::sqlbench::workload::driver::{DriverOptions, Operation, run_operations};
use crate::sqlbench::workload::{Workload, WorkloadSummary};

const NAME: &str = "tpcc";
const ITEMS_PER_WAREHOUSE: u32 = 100;
const INITIAL_QUANTITY: i64 = 10_000;
const RESTOCK_THRESHOLD: i64 = 10;

const CREATE_STOCK: &str = "\
CREATE TABLE IF NOT EXISTS sqlbench_stock (
    warehouse_id INT NOT NULL,
    item_id INT NOT NULL,
    quantity BIGINT NOT NULL,
    updates BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (warehouse_id, item_id)
)";

pub struct TpccWorkload {
    warehouses: u32,
}

impl TpccWorkload {
    pub fn new(warehouses: u32) -> Self {
        Self {
            warehouses: warehouses.max(1),
        }
    }

    pub(crate) fn warehouses(&self) -> u32 {
        self.warehouses
    }

    /// Create and seed the stock table. Dropping first is gated by
    /// `--dropdata`; seeding uses `INSERT IGNORE` so re-preparing against
    /// existing data is harmless.
    pub(crate) async fn prepare(&self, env: &RuntimeEnvironment) -> BenchResult<()> {
        let pool = env.pool();
        if env.config().drop_data {
            info!("[{NAME}] dropping existing data");
            pool.execute("DROP TABLE IF EXISTS sqlbench_stock")
                .await
                .map_err(|err| BenchError::workload(NAME, err))?;
        }
        pool.execute(CREATE_STOCK)
            .await
            .map_err(|err| BenchError::workload(NAME, err))?;

        for warehouse in 1..=self.warehouses {
            let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT IGNORE INTO sqlbench_stock (warehouse_id, item_id, quantity, updates) ",
            );
            builder.push_values(1..=ITEMS_PER_WAREHOUSE, |mut row, item| {
                row.push_bind(warehouse)
                    .push_bind(item)
                    .push_bind(INITIAL_QUANTITY)
                    .push_bind(0i64);
            });
            builder
                .build()
                .execute(pool)
                .await
                .map_err(|err| BenchError::workload(NAME, err))?;
        }
        info!(
            "[{NAME}] prepared {} warehouses x {ITEMS_PER_WAREHOUSE} items",
            self.warehouses
        );
        Ok(())
    }
}

#[async_trait]
impl Workload for TpccWorkload {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, env: &RuntimeEnvironment) -> BenchResult<WorkloadSummary> {
        self.prepare(env).await?;
        let options = DriverOptions::from_config(NAME, env.config().threads, env.config());
        let operation = Arc::new(StockTransaction {
            pool: env.pool().clone(),
            warehouses: self.warehouses,
        });
        run_operations(options, env.cancel_token(), operation).await
    }
}

pub(crate) struct StockTransaction {
    pub(crate) pool: MySqlPool,
    pub(crate) warehouses: u32,
}

#[async_trait]
impl Operation for StockTransaction {
    async fn execute(&self, _worker: usize, iteration: u64) -> Result<(), sqlx::Error> {
        let warehouse = warehouse_for(iteration, self.warehouses);
        let item = item_for(iteration);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE sqlbench_stock SET quantity = quantity - 1, updates = updates + 1 \
             WHERE warehouse_id = ? AND item_id = ?",
        )
        .bind(warehouse)
        .bind(item)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT quantity FROM sqlbench_stock WHERE warehouse_id = ? AND item_id = ?",
        )
        .bind(warehouse)
        .bind(item)
        .fetch_one(&mut *tx)
        .await?;

        let quantity: i64 = row.try_get("quantity")?;
        if quantity < RESTOCK_THRESHOLD {
            sqlx::query(
                "UPDATE sqlbench_stock SET quantity = quantity + ? \
                 WHERE warehouse_id = ? AND item_id = ?",
            )
            .bind(INITIAL_QUANTITY)
            .bind(warehouse)
            .bind(item)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

fn warehouse_for(iteration: u64, warehouses: u32) -> u32 {
    (iteration % u64::from(warehouses)) as u32 + 1
}

fn item_for(iteration: u64) -> u32 {
    // stride co-prime with the item count so updates spread over the table
    ((iteration.wrapping_mul(7)) % u64::from(ITEMS_PER_WAREHOUSE)) as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warehouse_and_item_stay_in_range() {
        for iteration in 0..1_000 {
            let warehouse = warehouse_for(iteration, 4);
            assert!((1..=4).contains(&warehouse));
            let item = item_for(iteration);
            assert!((1..=ITEMS_PER_WAREHOUSE).contains(&item));
        }
    }

    #[test]
    fn test_zero_warehouses_is_clamped() {
        let workload = TpccWorkload::new(0);
        assert_eq!(workload.warehouses, 1);
    }
}
