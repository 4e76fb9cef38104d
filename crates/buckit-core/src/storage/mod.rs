//! Per-bucket object storage.
//!
//! The upload stage writes into whichever bucket a message routes to, so
//! stores are created lazily per bucket name and cached for the life of the
//! process. All buckets share one backend configuration (S3 region and
//! credentials, a local root directory, or in-memory for tests).

mod local;
mod s3;

pub use local::LocalConfig;
pub use s3::S3Config;

use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::emit;
use crate::error::{InvalidBucketSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

/// Backend used for every bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    S3(S3Config),
    Local(LocalConfig),
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::S3(S3Config::default())
    }
}

/// A reference-counted bucket storage.
pub type BucketStorageRef = Arc<BucketStorage>;

/// Lazily-built object stores keyed by bucket name.
pub struct BucketStorage {
    config: StorageConfig,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl std::fmt::Debug for BucketStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BucketStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// In-memory storage, used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self::new(StorageConfig::Memory)
    }

    /// Get or create the store for `bucket`.
    pub async fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        validate_bucket(bucket)?;

        if let Some(store) = self.stores.read().await.get(bucket) {
            return Ok(store.clone());
        }

        let mut stores = self.stores.write().await;
        // Re-check: another task may have built it while we waited for the lock
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = match &self.config {
            StorageConfig::S3(config) => s3::build_s3(config, bucket)?,
            StorageConfig::Local(config) => local::build_local(config, bucket).await?,
            StorageConfig::Memory => Arc::new(InMemory::new()),
        };
        debug!(bucket, "Created object store");
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Write `payload` to `bucket` under `key`, replacing any existing object.
    pub async fn put(&self, bucket: &str, key: &str, payload: Bytes) -> Result<(), StorageError> {
        let store = self.store_for(bucket).await?;
        let result = store.put(&Path::from(key), PutPayload::from(payload)).await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: status_of(&result),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Read the object at `key` in `bucket`.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.store_for(bucket).await?;
        let result = store.get(&Path::from(key)).await;

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: status_of(&result),
        });

        result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }
}

fn status_of<T>(result: &Result<T, object_store::Error>) -> RequestStatus {
    if result.is_ok() {
        RequestStatus::Success
    } else {
        RequestStatus::Error
    }
}

/// Bucket names become directory names and S3 bucket identifiers.
fn validate_bucket(bucket: &str) -> Result<(), StorageError> {
    let invalid = bucket.is_empty()
        || bucket == "."
        || bucket == ".."
        || bucket.contains(['/', '\\']);
    ensure!(
        !invalid,
        InvalidBucketSnafu {
            bucket: bucket.to_string()
        }
    );
    Ok(())
}
