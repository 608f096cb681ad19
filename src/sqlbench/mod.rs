pub mod config;
pub mod connection;
pub mod error;
pub mod runtime;
pub mod shutdown;
pub mod workload;

// Re-export the types workloads touch most often
pub use config::BenchConfig;
pub use error::{BenchError, BenchResult};
pub use runtime::RuntimeEnvironment;
