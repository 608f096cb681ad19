//! Shared database connection management.
//!
//! Every run owns exactly one pooled connection handle, opened here and
//! shared by all worker tasks. Opening probes the target eagerly; when the
//! probe fails because the named database does not exist, the database is
//! created through a short-lived schema-less connection and the pooled
//! handle is re-opened and re-probed before success is reported. A handle
//! that failed its probe never escapes.
//!
//! Session state (transaction isolation, operator-supplied session
//! variables) is applied to every pooled connection at establishment, so
//! each worker sees the same session regardless of which pool slot it
//! draws.
//!
//! Multi-statement batches (some workload queries are composed of several
//! statements issued together) go through [`sqlx::raw_sql`], which executes
//! them in one round trip.

use std::sync::Arc;

use log::{debug, info};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{Connection, Executor, MySqlConnection};

use crate::sqlbench::config::BenchConfig;
use crate::sqlbench::error::{BenchError, BenchResult};

/// MySQL error number for "Unknown database '%s'".
const ER_BAD_DB: &str = "1049";
const UNKNOWN_DATABASE: &str = "Unknown database";

/// Opens and owns the single shared pool of a run.
///
/// At most one live pool exists per manager; re-opening closes the previous
/// handle first. Closing is idempotent and safe to call when nothing was
/// ever opened.
pub struct ConnectionManager {
    config: Arc<BenchConfig>,
    pool: Option<MySqlPool>,
}

impl ConnectionManager {
    pub fn new(config: Arc<BenchConfig>) -> Self {
        Self { config, pool: None }
    }

    /// Open the shared pool, creating the target database on first use.
    ///
    /// Pool capacity is `threads + ac_threads + 1`: one connection per
    /// configured client plus headroom for auxiliary queries.
    pub async fn open(&mut self) -> BenchResult<MySqlPool> {
        self.close().await;

        let pool = match self.try_connect().await {
            Ok(pool) => pool,
            Err(err) if is_unknown_database(&err) => {
                info!(
                    "database '{}' does not exist, creating it",
                    self.config.db_name
                );
                self.create_database().await?;
                self.try_connect()
                    .await
                    .map_err(|err| BenchError::connect(self.target(), err))?
            }
            Err(err) => return Err(BenchError::connect(self.target(), err)),
        };

        debug!(
            "opened pool of {} connections to {}",
            self.config.pool_size(),
            self.target()
        );
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    /// Close the pool. Safe to call repeatedly or when never opened.
    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            debug!("closed pool to {}", self.target());
        }
    }

    /// The live pool, if one is open.
    pub fn handle(&self) -> Option<MySqlPool> {
        self.pool.clone()
    }

    async fn try_connect(&self) -> Result<MySqlPool, sqlx::Error> {
        let statements = Arc::new(self.config.session_statements());
        let pool = MySqlPoolOptions::new()
            .max_connections(self.config.pool_size() as u32)
            .after_connect(move |conn, _meta| {
                let statements = Arc::clone(&statements);
                Box::pin(async move {
                    for statement in statements.iter() {
                        conn.execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(self.connect_options(true))
            .await?;

        // probe: the first acquire validates credentials, the database
        // name, and every configured session statement
        let mut probe = pool.acquire().await?;
        probe.ping().await?;
        drop(probe);

        Ok(pool)
    }

    async fn create_database(&self) -> BenchResult<()> {
        let options = self.connect_options(false);
        let mut conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|err| BenchError::connect(self.target(), err))?;
        let ddl = format!("CREATE DATABASE IF NOT EXISTS `{}`", self.config.db_name);
        let created = conn.execute(ddl.as_str()).await;
        let _ = conn.close().await;
        created.map_err(|err| BenchError::schema_creation(&self.config.db_name, err))?;
        Ok(())
    }

    fn connect_options(&self, with_database: bool) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .charset("utf8mb4");
        if !self.config.password.is_empty() {
            options = options.password(&self.config.password);
        }
        if with_database {
            options = options.database(&self.config.db_name);
        }
        options
    }

    /// Connection target for logs and errors. Never includes credentials.
    fn target(&self) -> String {
        format!(
            "{}:{}/{}",
            self.config.host, self.config.port, self.config.db_name
        )
    }
}

/// True when the server is telling us the named database does not exist
/// (MySQL error 1049), the one recoverable probe failure.
pub fn is_unknown_database(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches_unknown_database(db_err.code().as_deref(), db_err.message())
        }
        _ => false,
    }
}

fn matches_unknown_database(code: Option<&str>, message: &str) -> bool {
    code == Some(ER_BAD_DB) || message.contains(UNKNOWN_DATABASE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_unknown_database() {
        assert!(matches_unknown_database(
            Some("1049"),
            "Unknown database 'bench'"
        ));
        // some proxies drop the code but keep the server message
        assert!(matches_unknown_database(None, "Unknown database 'bench'"));
        assert!(!matches_unknown_database(
            Some("1045"),
            "Access denied for user 'root'@'localhost'"
        ));
        assert!(!matches_unknown_database(None, "connection refused"));
    }

    #[test]
    fn test_non_database_errors_are_fatal() {
        assert!(!is_unknown_database(&sqlx::Error::RowNotFound));
        assert!(!is_unknown_database(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_target_redacts_credentials() {
        let config = Arc::new(BenchConfig {
            password: "s3cret".to_string(),
            ..BenchConfig::default()
        });
        let manager = ConnectionManager::new(config);
        let target = manager.target();
        assert_eq!(target, "127.0.0.1:4000/test");
        assert!(!target.contains("s3cret"));
    }
}
