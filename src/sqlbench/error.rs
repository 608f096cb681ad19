//! Error types for the benchmarking control plane.
//!
//! Startup errors (connect, schema creation, configuration) abort the run
//! before any workload executes. Workload errors come back as the
//! workload's own completion result and determine the process exit code.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type BenchResult<T> = Result<T, BenchError>;

/// Main error type for the benchmarking harness.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The connection probe failed for a reason other than a missing
    /// database. Fatal: the caller must abort the run, not retry.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// The target database was missing and creating it failed.
    #[error("failed to create database '{db_name}': {source}")]
    SchemaCreation {
        db_name: String,
        #[source]
        source: sqlx::Error,
    },

    /// Invalid run configuration, rejected before connecting.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A workload operation failed and `--ignore-error` was not set.
    #[error("workload '{workload}' failed: {source}")]
    Workload {
        workload: String,
        #[source]
        source: sqlx::Error,
    },

    /// A worker task aborted without returning a result.
    #[error("workload '{workload}' worker aborted: {message}")]
    WorkerAborted { workload: String, message: String },

    /// Filesystem errors, e.g. an unreadable raw SQL script.
    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    /// Helper to create a fatal connect error.
    pub fn connect(target: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Connect {
            target: target.into(),
            source,
        }
    }

    /// Helper to create a schema creation error.
    pub fn schema_creation(db_name: impl Into<String>, source: sqlx::Error) -> Self {
        Self::SchemaCreation {
            db_name: db_name.into(),
            source,
        }
    }

    /// Helper to create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Helper to create a workload error.
    pub fn workload(workload: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Workload {
            workload: workload.into(),
            source,
        }
    }

    /// Helper to create a worker abort error.
    pub fn worker_aborted(workload: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerAborted {
            workload: workload.into(),
            message: message.into(),
        }
    }

    /// Helper to create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = BenchError::config("threads must be at least 1");
        assert_eq!(
            err.to_string(),
            "configuration error: threads must be at least 1"
        );

        let err = BenchError::connect("127.0.0.1:4000/test", sqlx::Error::PoolTimedOut);
        assert!(err.to_string().contains("127.0.0.1:4000/test"));
    }

    #[test]
    fn test_io_error_preserves_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = BenchError::io("read queries.sql", inner);
        assert!(err.to_string().contains("read queries.sql"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
