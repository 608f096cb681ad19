//! sqlbench - benchmark a MySQL-compatible database with pluggable
//! workloads.
//!
//! The binary wires the control plane together: parse flags into the
//! immutable run configuration, open the shared pool (creating the target
//! database on first use), start the signal supervisor, dispatch exactly
//! one workload, and exit 0 on clean completion or 1 on any fatal error or
//! forced shutdown.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use tokio::sync::oneshot;

use sqlbench::sqlbench::config::{BenchConfig, IsolationLevel, parse_duration};
use sqlbench::sqlbench::connection::ConnectionManager;
use sqlbench::sqlbench::error::BenchResult;
use sqlbench::sqlbench::runtime::RuntimeEnvironment;
use sqlbench::sqlbench::shutdown::{
    DEFAULT_GRACE_PERIOD, ShutdownController, ShutdownOutcome, spawn_signal_listener,
};
use sqlbench::sqlbench::workload::Workload;
use sqlbench::sqlbench::workload::ch::ChWorkload;
use sqlbench::sqlbench::workload::rawsql::RawSqlWorkload;
use sqlbench::sqlbench::workload::tpcc::TpccWorkload;
use sqlbench::sqlbench::workload::tpch::TpchWorkload;

#[derive(Parser)]
#[command(name = "sqlbench")]
#[command(about = "Benchmark database with different workloads")]
#[command(version)]
#[command(infer_subcommands = true)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Database name
    #[arg(short = 'D', long = "db", default_value = "test", global = true)]
    db: String,

    /// Database host
    #[arg(short = 'H', long, default_value = "127.0.0.1", global = true)]
    host: String,

    /// Database user
    #[arg(short = 'U', long, default_value = "root", global = true)]
    user: String,

    /// Database password
    #[arg(short = 'p', long, default_value = "", global = true)]
    password: String,

    /// Database port
    #[arg(short = 'P', long, default_value_t = 4000, global = true)]
    port: u16,

    /// Transactional client concurrency
    #[arg(short = 'T', long, default_value_t = 1, global = true)]
    threads: usize,

    /// Analytical client concurrency, used by the mixed workload
    #[arg(short = 't', long = "ac-threads", default_value_t = 1, global = true)]
    ac_threads: usize,

    /// Database driver: mysql
    #[arg(short = 'd', long, default_value = "mysql", global = true)]
    driver: String,

    /// Total execution time, e.g. 1h / 30m / 90s; unbounded when omitted
    #[arg(long = "time", value_parser = duration_flag, global = true)]
    time: Option<Duration>,

    /// Total execution count, 0 means unbounded
    #[arg(long = "count", default_value_t = 0, global = true)]
    count: u64,

    /// Drop benchmark data before preparing
    #[arg(long = "dropdata", global = true)]
    dropdata: bool,

    /// Ignore errors when running the workload
    #[arg(long = "ignore-error", global = true)]
    ignore_error: bool,

    /// Don't print per-error output when running the workload
    #[arg(long, global = true)]
    silence: bool,

    /// Output interval time
    #[arg(long = "interval", value_parser = duration_flag, default_value = "10s", global = true)]
    interval: Duration,

    /// Isolation level 0: Default, 1: ReadUncommitted, 2: ReadCommitted,
    /// 3: WriteCommitted, 4: RepeatableRead, 5: Snapshot, 6: Serializable,
    /// 7: Linearizable
    #[arg(
        long = "isolation",
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=7),
        global = true
    )]
    isolation: u8,

    /// Extra session variables, e.g. "tidb_enable_async_commit=1&sql_mode=ANSI"
    #[arg(long = "conn-params", default_value = "", global = true)]
    conn_params: String,

    /// Cap on runtime worker threads, 0 means the runtime default
    #[arg(long = "max-procs", default_value_t = 0, global = true)]
    max_procs: usize,

    /// Address of a profiling endpoint, recorded for external exporters
    #[arg(long = "pprof", global = true)]
    pprof_addr: Option<String>,

    /// Address of a metrics endpoint, recorded for external exporters
    #[arg(long = "metrics-addr", global = true)]
    metrics_addr: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transactional workload
    Tpcc {
        /// Number of warehouses the stock table is partitioned into
        #[arg(long, default_value_t = 4)]
        warehouses: u32,
    },
    /// Run the analytical workload
    Tpch {
        /// Rows seeded into the fact table before the run
        #[arg(long, default_value_t = 10_000)]
        rows: u64,
    },
    /// Run the mixed transactional + analytical workload
    Ch {
        /// Number of warehouses the stock table is partitioned into
        #[arg(long, default_value_t = 4)]
        warehouses: u32,
        /// Rows seeded into the fact table before the run
        #[arg(long, default_value_t = 10_000)]
        rows: u64,
    },
    /// Execute operator-supplied SQL files as the workload
    Rawsql {
        /// SQL files executed round-robin, one file per iteration
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print version information
    Version,
}

fn duration_flag(input: &str) -> Result<Duration, String> {
    parse_duration(input)
        .ok_or_else(|| format!("invalid duration '{input}', expected forms like 30s, 5m or 1h"))
}

fn build_config(common: &CommonArgs) -> BenchResult<BenchConfig> {
    let config = BenchConfig {
        db_name: common.db.clone(),
        host: common.host.clone(),
        port: common.port,
        user: common.user.clone(),
        password: common.password.clone(),
        threads: common.threads,
        ac_threads: common.ac_threads,
        driver: common.driver.clone(),
        total_time: common.time.unwrap_or(Duration::MAX),
        total_count: common.count,
        drop_data: common.dropdata,
        ignore_error: common.ignore_error,
        silence: common.silence,
        output_interval: common.interval,
        isolation: IsolationLevel::try_from(common.isolation)?,
        conn_params: common.conn_params.clone(),
        max_procs: common.max_procs,
        pprof_addr: common.pprof_addr.clone(),
        metrics_addr: common.metrics_addr.clone(),
    };
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> BenchResult<()> {
    let workload: Box<dyn Workload> = match cli.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Tpcc { warehouses } => Box::new(TpccWorkload::new(warehouses)),
        Commands::Tpch { rows } => Box::new(TpchWorkload::new(rows)),
        Commands::Ch { warehouses, rows } => Box::new(ChWorkload::new(warehouses, rows)),
        Commands::Rawsql { ref files } => Box::new(RawSqlWorkload::load(files)?),
    };

    let config = Arc::new(build_config(&cli.common)?);

    let controller = ShutdownController::new(DEFAULT_GRACE_PERIOD);
    let (done_tx, done_rx) = oneshot::channel();
    let supervisor = tokio::spawn(
        controller
            .clone()
            .supervise_and_exit(spawn_signal_listener(), done_rx),
    );

    let mut manager = ConnectionManager::new(Arc::clone(&config));
    let pool = manager.open().await?;
    let env = RuntimeEnvironment::new(Arc::clone(&config), pool, controller.token());

    info!(
        "running workload '{}' against {}:{}/{}",
        workload.name(),
        config.host,
        config.port,
        config.db_name
    );
    let result = workload.run(&env).await;

    // hand control back to the supervisor before tearing anything down
    let _ = done_tx.send(());
    let outcome = supervisor.await.unwrap_or(ShutdownOutcome::Completed);
    manager.close().await;

    let summary = result?;
    info!("{summary}");
    if let ShutdownOutcome::Graceful(signal) = outcome {
        info!("shut down cleanly after {signal}");
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if cli.common.max_procs > 0 {
        builder.worker_threads(cli.common.max_procs);
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start the runtime: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        error!("{err}");
        process::exit(1);
    }
}
