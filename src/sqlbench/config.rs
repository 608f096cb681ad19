//! Run configuration for the benchmarking harness.
//!
//! A [`BenchConfig`] is parsed once at startup and shared read-only (behind
//! an `Arc`) with the connection manager and every workload for the rest of
//! the run, so no locking is needed anywhere.
//!
//! # Examples
//!
//! ```rust
//! use sqlbench::sqlbench::config::{BenchConfig, IsolationLevel};
//!
//! let config = BenchConfig::default()
//!     .with_threads(16)
//!     .with_ac_threads(2)
//!     .with_isolation(IsolationLevel::RepeatableRead);
//!
//! // pool headroom: one extra connection for auxiliary queries
//! assert_eq!(config.pool_size(), 19);
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::sqlbench::error::{BenchError, BenchResult};

/// Transaction isolation requested per session, as an enumerated integer
/// 0-7. Levels beyond the four standard ones exist for engines that extend
/// the standard set; servers reject what they do not support at connect
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum IsolationLevel {
    #[default]
    Default = 0,
    ReadUncommitted = 1,
    ReadCommitted = 2,
    WriteCommitted = 3,
    RepeatableRead = 4,
    Snapshot = 5,
    Serializable = 6,
    Linearizable = 7,
}

impl IsolationLevel {
    /// The operand for `SET SESSION TRANSACTION ISOLATION LEVEL`, or
    /// `None` when the server default should be left alone.
    pub fn sql_name(self) -> Option<&'static str> {
        match self {
            IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::WriteCommitted => Some("WRITE COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Snapshot => Some("SNAPSHOT"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
            IsolationLevel::Linearizable => Some("LINEARIZABLE"),
        }
    }
}

impl TryFrom<u8> for IsolationLevel {
    type Error = BenchError;

    fn try_from(value: u8) -> BenchResult<Self> {
        match value {
            0 => Ok(IsolationLevel::Default),
            1 => Ok(IsolationLevel::ReadUncommitted),
            2 => Ok(IsolationLevel::ReadCommitted),
            3 => Ok(IsolationLevel::WriteCommitted),
            4 => Ok(IsolationLevel::RepeatableRead),
            5 => Ok(IsolationLevel::Snapshot),
            6 => Ok(IsolationLevel::Serializable),
            7 => Ok(IsolationLevel::Linearizable),
            other => Err(BenchError::config(format!(
                "isolation level must be 0-7, got {other}"
            ))),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sql_name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "DEFAULT"),
        }
    }
}

/// Immutable-after-parse configuration shared by every component of a run.
///
/// Constructed once at startup, read-only afterward.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Target database (schema) name
    pub db_name: String,
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Transactional client concurrency
    pub threads: usize,
    /// Analytical client concurrency, used by the mixed workload
    pub ac_threads: usize,
    /// Database driver selector; only `mysql` is supported
    pub driver: String,
    /// Total execution time budget
    pub total_time: Duration,
    /// Total execution count budget, 0 means unbounded
    pub total_count: u64,
    /// Drop benchmark data before preparing
    pub drop_data: bool,
    /// Keep running when an individual operation fails
    pub ignore_error: bool,
    /// Suppress per-error output while running
    pub silence: bool,
    /// Progress report interval
    pub output_interval: Duration,
    /// Session transaction isolation level
    pub isolation: IsolationLevel,
    /// Extra session variables, `key=value` pairs joined with `&`
    pub conn_params: String,
    /// Cap on runtime worker threads, 0 means the runtime default
    pub max_procs: usize,
    /// Profiling endpoint address, recorded for external exporters
    pub pprof_addr: Option<String>,
    /// Metrics endpoint address, recorded for external exporters
    pub metrics_addr: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            db_name: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 4000,
            user: "root".to_string(),
            password: String::new(),
            threads: 1,
            ac_threads: 1,
            driver: "mysql".to_string(),
            total_time: Duration::MAX,
            total_count: 0,
            drop_data: false,
            ignore_error: false,
            silence: false,
            output_interval: Duration::from_secs(10),
            isolation: IsolationLevel::Default,
            conn_params: String::new(),
            max_procs: 0,
            pprof_addr: None,
            metrics_addr: None,
        }
    }
}

impl BenchConfig {
    /// Set the target host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the target port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the target database name.
    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    /// Set the transactional client concurrency.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the analytical client concurrency.
    pub fn with_ac_threads(mut self, ac_threads: usize) -> Self {
        self.ac_threads = ac_threads;
        self
    }

    /// Set the total time budget.
    pub fn with_total_time(mut self, total_time: Duration) -> Self {
        self.total_time = total_time;
        self
    }

    /// Set the total iteration budget (0 = unbounded).
    pub fn with_total_count(mut self, total_count: u64) -> Self {
        self.total_count = total_count;
        self
    }

    /// Set the session isolation level.
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the extra session variables.
    pub fn with_conn_params(mut self, conn_params: impl Into<String>) -> Self {
        self.conn_params = conn_params.into();
        self
    }

    /// Connection pool capacity: one connection per configured client plus
    /// headroom for auxiliary queries such as schema creation.
    pub fn pool_size(&self) -> usize {
        self.threads + self.ac_threads + 1
    }

    /// The `SET SESSION` statements applied to every pooled connection at
    /// establishment: the isolation level first, then the operator-supplied
    /// session variables in the order given.
    pub fn session_statements(&self) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = self.isolation.sql_name() {
            statements.push(format!(
                "SET SESSION TRANSACTION ISOLATION LEVEL {level}"
            ));
        }
        for pair in self.conn_params.split('&').filter(|p| !p.is_empty()) {
            if let Some((key, value)) = pair.split_once('=') {
                statements.push(format!("SET SESSION {} = {}", key.trim(), value.trim()));
            }
        }
        statements
    }

    /// Reject configurations the run cannot proceed with.
    pub fn validate(&self) -> BenchResult<()> {
        if self.driver != "mysql" {
            return Err(BenchError::config(format!(
                "unsupported driver '{}', only mysql is available",
                self.driver
            )));
        }
        if self.threads == 0 {
            return Err(BenchError::config("threads must be at least 1"));
        }
        if self.ac_threads == 0 {
            return Err(BenchError::config("ac-threads must be at least 1"));
        }
        for pair in self.conn_params.split('&').filter(|p| !p.is_empty()) {
            if !pair.contains('=') {
                return Err(BenchError::config(format!(
                    "malformed conn-params entry '{pair}', expected key=value"
                )));
            }
        }
        Ok(())
    }
}

/// Parse a human-readable duration such as `"30s"`, `"5m"`, `"1.5h"` or
/// `"250ms"`. A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let (number_part, unit_part) = match input.find(|c: char| c.is_alphabetic()) {
        Some(pos) => (&input[..pos], &input[pos..]),
        None => (input.as_str(), "s"),
    };

    let number: f64 = number_part.trim().parse().ok()?;
    if number < 0.0 || !number.is_finite() {
        return None;
    }

    let seconds = match unit_part.trim() {
        "ms" | "millis" | "milliseconds" => number / 1000.0,
        "s" | "sec" | "secs" | "second" | "seconds" => number,
        "m" | "min" | "mins" | "minute" | "minutes" => number * 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => number * 3600.0,
        "d" | "day" | "days" => number * 86400.0,
        _ => return None,
    };
    // Duration::from_secs_f64 panics past u64 seconds
    if seconds >= u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_flag_table() {
        let config = BenchConfig::default();
        assert_eq!(config.db_name, "test");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.user, "root");
        assert_eq!(config.threads, 1);
        assert_eq!(config.ac_threads, 1);
        assert_eq!(config.total_count, 0);
        assert_eq!(config.output_interval, Duration::from_secs(10));
        assert_eq!(config.isolation, IsolationLevel::Default);
        assert!(!config.drop_data);
        assert!(!config.ignore_error);
        assert!(!config.silence);
    }

    #[test]
    fn test_pool_size_is_threads_plus_ac_threads_plus_one() {
        for threads in 1..=8 {
            for ac_threads in 1..=8 {
                let config = BenchConfig::default()
                    .with_threads(threads)
                    .with_ac_threads(ac_threads);
                assert_eq!(config.pool_size(), threads + ac_threads + 1);
            }
        }
    }

    #[test]
    fn test_isolation_level_from_integer() {
        assert_eq!(
            IsolationLevel::try_from(0).unwrap(),
            IsolationLevel::Default
        );
        assert_eq!(
            IsolationLevel::try_from(4).unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            IsolationLevel::try_from(7).unwrap(),
            IsolationLevel::Linearizable
        );
        assert!(IsolationLevel::try_from(8).is_err());
    }

    #[test]
    fn test_isolation_sql_name_only_default_is_none() {
        assert!(IsolationLevel::Default.sql_name().is_none());
        for value in 1..=7u8 {
            let level = IsolationLevel::try_from(value).unwrap();
            assert!(level.sql_name().is_some(), "level {value} has no SQL name");
        }
    }

    #[test]
    fn test_session_statements_order_and_content() {
        let config = BenchConfig::default()
            .with_isolation(IsolationLevel::ReadCommitted)
            .with_conn_params("tidb_isolation_read_engines=tiflash&sql_mode=ANSI");
        let statements = config.session_statements();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            "SET SESSION TRANSACTION ISOLATION LEVEL READ COMMITTED"
        );
        assert_eq!(
            statements[1],
            "SET SESSION tidb_isolation_read_engines = tiflash"
        );
        assert_eq!(statements[2], "SET SESSION sql_mode = ANSI");
    }

    #[test]
    fn test_session_statements_empty_when_nothing_configured() {
        assert!(BenchConfig::default().session_statements().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        assert!(BenchConfig::default().validate().is_ok());

        let mut config = BenchConfig::default();
        config.driver = "postgres".to_string();
        assert!(config.validate().is_err());

        let config = BenchConfig::default().with_threads(0);
        assert!(config.validate().is_err());

        let config = BenchConfig::default().with_conn_params("not-a-pair");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_sets_budgets() {
        let config = BenchConfig::default()
            .with_total_time(Duration::from_secs(2))
            .with_total_count(500);
        assert_eq!(config.total_time, Duration::from_secs(2));
        assert_eq!(config.total_count, 500);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration("5 parsecs"), None);
    }
}
