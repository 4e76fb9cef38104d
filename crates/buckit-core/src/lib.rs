//! buckit-core: Shared infrastructure for the buckit upload stage.
//!
//! - `storage/` - Per-bucket object storage (S3, local, in-memory)
//! - `metrics/` - Prometheus metrics events and HTTP endpoint
//! - `config/` - YAML loading with environment variable interpolation, CLI arguments
//! - `topology/` - Supervision of long-running loops
//! - `signal` - Signal handling for graceful shutdown
//! - `tracing` - Subscriber initialization (text or JSON)
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod storage;
pub mod topology;
pub mod tracing;

pub use config::{CliArgs, DEFAULT_METRICS_ADDR, MetricsConfig, load_yaml, parse_yaml};
pub use error::{ConfigError, MetricsError, SetupError, StorageError};
pub use metrics::{MetricsController, init_global as init_metrics, init_test as init_metrics_test};
pub use signal::{shutdown_signal, spawn_shutdown_handler};
pub use storage::{BucketStorage, BucketStorageRef, StorageConfig};
pub use topology::{ExitReason, LoopExit, Task, TaskError, TaskResult, run_until_exit};
pub use self::tracing::init_tracing;

use snafu::ResultExt;

use crate::error::{AddressParseSnafu, MetricsSnafu};

/// Parse `address` and start the metrics endpoint on it.
pub fn start_metrics(address: &str) -> Result<(), SetupError> {
    let addr = address.parse().context(AddressParseSnafu { address })?;
    init_metrics(addr).context(MetricsSnafu)
}
