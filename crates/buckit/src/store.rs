//! Persisting fetched payloads into their service bucket.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use snafu::prelude::*;
use tracing::info;

use buckit_core::emit;
use buckit_core::metrics::events::{PayloadStored, StoreCompleted};
use buckit_core::BucketStorageRef;

use crate::envelope::{Envelope, ObjectKey, RequestContext};
use crate::error::{StoreError, WriteSnafu};
use crate::key::derive_key;

/// Writes a payload under a key derived from its envelope.
#[async_trait]
pub trait Storer: Send + Sync {
    /// Store `payload` in `bucket`, returning the key it was written under.
    ///
    /// There is no existence check: a key collision overwrites.
    async fn store(
        &self,
        payload: Bytes,
        bucket: &str,
        envelope: &Envelope,
        ctx: &RequestContext,
    ) -> Result<ObjectKey, StoreError>;
}

/// Object-store-backed storer.
#[derive(Debug, Clone)]
pub struct ObjectStorer {
    storage: BucketStorageRef,
}

impl ObjectStorer {
    pub fn new(storage: BucketStorageRef) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Storer for ObjectStorer {
    async fn store(
        &self,
        payload: Bytes,
        bucket: &str,
        envelope: &Envelope,
        ctx: &RequestContext,
    ) -> Result<ObjectKey, StoreError> {
        let size = payload.len() as u64;
        let key = derive_key(envelope, ctx);
        info!("Storing {} bytes into '{}/{}'", size, bucket, key);

        let start = Instant::now();
        let result = self.storage.put(bucket, key.as_str(), payload).await;
        emit!(StoreCompleted {
            duration: start.elapsed(),
        });

        result.context(WriteSnafu {
            bucket,
            key: key.as_str(),
        })?;

        emit!(PayloadStored {
            bytes: size,
            bucket: bucket.to_string(),
        });
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buckit_core::BucketStorage;
    use std::sync::Arc;

    fn envelope() -> Envelope {
        Envelope {
            request_id: "r1".to_string(),
            url: "http://x".to_string(),
            service: "svcA".to_string(),
            b64_identity: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_store_writes_under_derived_key() {
        let storage = Arc::new(BucketStorage::in_memory());
        let storer = ObjectStorer::new(storage.clone());
        let ctx = RequestContext::new("r1");

        let key = storer
            .store(Bytes::from_static(b"data"), "bucket1", &envelope(), &ctx)
            .await
            .unwrap();

        assert_eq!(key.as_str(), "r1");
        assert_eq!(storage.get("bucket1", "r1").await.unwrap().as_ref(), b"data");
    }

    #[tokio::test]
    async fn test_store_twice_overwrites() {
        let storage = Arc::new(BucketStorage::in_memory());
        let storer = ObjectStorer::new(storage.clone());
        let ctx = RequestContext::new("r1");

        storer
            .store(Bytes::from_static(b"first"), "bucket1", &envelope(), &ctx)
            .await
            .unwrap();
        storer
            .store(Bytes::from_static(b"replayed"), "bucket1", &envelope(), &ctx)
            .await
            .unwrap();

        assert_eq!(
            storage.get("bucket1", "r1").await.unwrap().as_ref(),
            b"replayed"
        );
    }

    #[tokio::test]
    async fn test_store_reports_bucket_and_key_on_failure() {
        let storer = ObjectStorer::new(Arc::new(BucketStorage::in_memory()));
        let ctx = RequestContext::new("r1");

        let err = storer
            .store(Bytes::from_static(b"x"), "bad/bucket", &envelope(), &ctx)
            .await
            .unwrap_err();

        let StoreError::Write { bucket, key, .. } = err;
        assert_eq!(bucket, "bad/bucket");
        assert_eq!(key, "r1");
    }
}
