//! Service configuration.
//!
//! Loaded from a YAML file with `${VAR}` interpolation. Every section is
//! optional; an empty file runs against `kafka:29092` and S3 in `us-east-1`.
//!
//! ```yaml
//! queue:
//!   brokers: ${BOOTSTRAP_SERVERS:-kafka:29092}
//!   group_id: buckit
//!   consume_topic: platform.upload.buckit
//!   produce_topic: platform.upload.validation
//! storage:
//!   backend: s3
//!   region: ${AWS_REGION:-us-east-1}
//! fetch:
//!   timeout_secs: 30
//! bucket_map_file: /etc/buckit/bucket_map.json
//! handoff:
//!   capacity: 1000
//! metrics:
//!   address: 0.0.0.0:9090
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use buckit_core::error::{ConfigError, EmptyFieldSnafu, ZeroValueSnafu};
use buckit_core::{MetricsConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::unpack::BucketMap;

/// Kafka connection and topic settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// Consumer group shared by all replicas.
    pub group_id: String,
    /// Inbound upload notifications.
    pub consume_topic: String,
    /// Outbound validation results.
    pub produce_topic: String,
    /// Where a new consumer group starts reading.
    pub auto_offset_reset: String,
    /// How long to wait for a broker acknowledgement.
    pub delivery_timeout_secs: u64,
    /// Extra librdkafka properties (TLS, SASL), applied last.
    pub properties: HashMap<String, String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            brokers: "kafka:29092".to_string(),
            group_id: "buckit".to_string(),
            consume_topic: "platform.upload.buckit".to_string(),
            produce_topic: "platform.upload.validation".to_string(),
            auto_offset_reset: "latest".to_string(),
            delivery_timeout_secs: 30,
            properties: HashMap::new(),
        }
    }
}

/// Payload retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Hand-off queue sizing. No capacity means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandoffConfig {
    pub capacity: Option<usize>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    /// JSON file of `service: bucket` pairs.
    pub bucket_map_file: Option<PathBuf>,
    /// Inline mappings, layered over the file.
    pub bucket_map: HashMap<String, String>,
    pub handoff: HandoffConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = buckit_core::load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = buckit_core::parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let queue = &self.queue;
        for (field, value) in [
            ("queue.brokers", &queue.brokers),
            ("queue.group_id", &queue.group_id),
            ("queue.consume_topic", &queue.consume_topic),
            ("queue.produce_topic", &queue.produce_topic),
            ("metrics.address", &self.metrics.address),
        ] {
            ensure!(!value.trim().is_empty(), EmptyFieldSnafu { field });
        }

        ensure!(
            queue.delivery_timeout_secs > 0,
            ZeroValueSnafu {
                field: "queue.delivery_timeout_secs"
            }
        );
        ensure!(
            self.fetch.timeout_secs > 0,
            ZeroValueSnafu {
                field: "fetch.timeout_secs"
            }
        );
        ensure!(
            self.handoff.capacity != Some(0),
            ZeroValueSnafu {
                field: "handoff.capacity"
            }
        );
        Ok(())
    }

    /// Build the routing table: the file first, then inline entries.
    pub fn load_buckets(&self) -> BucketMap {
        let mut buckets = match &self.bucket_map_file {
            Some(path) => BucketMap::load(path),
            None => BucketMap::default(),
        };
        buckets.extend(self.bucket_map.clone());
        buckets
    }
}
