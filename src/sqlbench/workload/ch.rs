//! Mixed workload: the transactional and analytical loops running side by
//! side against the same pool, with `threads` transactional workers and
//! `ac_threads` analytical workers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::sqlbench::error::BenchResult;
use crate::sqlbench::runtime::RuntimeEnvironment;
use crate::sqlbench::workload::driver::{DriverOptions, run_operations};
use crate::sqlbench::workload::tpcc::{StockTransaction, TpccWorkload};
use crate::sqlbench::workload::tpch::{AggregateScan, TpchWorkload};
use crate::sqlbench::workload::{Workload, WorkloadSummary};

const NAME: &str = "ch";

pub struct ChWorkload {
    transactional: TpccWorkload,
    analytical: TpchWorkload,
}

impl ChWorkload {
    pub fn new(warehouses: u32, rows: u64) -> Self {
        Self {
            transactional: TpccWorkload::new(warehouses),
            analytical: TpchWorkload::new(rows),
        }
    }
}

#[async_trait]
impl Workload for ChWorkload {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, env: &RuntimeEnvironment) -> BenchResult<WorkloadSummary> {
        self.transactional.prepare(env).await?;
        self.analytical.prepare(env).await?;

        let config = env.config();
        let transactions = run_operations(
            DriverOptions::from_config("ch-transactional", config.threads, config),
            env.cancel_token(),
            Arc::new(StockTransaction {
                pool: env.pool().clone(),
                warehouses: self.transactional.warehouses(),
            }),
        );
        let scans = run_operations(
            DriverOptions::from_config("ch-analytical", config.ac_threads, config),
            env.cancel_token(),
            Arc::new(AggregateScan {
                pool: env.pool().clone(),
            }),
        );

        let (transactions, scans) = tokio::join!(transactions, scans);
        let parts = [transactions?, scans?];
        Ok(WorkloadSummary::combined(NAME, &parts))
    }
}
