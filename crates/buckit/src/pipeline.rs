//! The consumption loop: unpack, fetch and store one message at a time.
//!
//! A message either ends up as a [`ResultRecord`] on the hand-off queue or is
//! dropped at the stage that failed. Drops are logged with the request id and
//! counted, and the loop moves on to the next message. Messages are handled
//! strictly in arrival order, so records reach the forwarder in that order.

use std::sync::Arc;

use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

use buckit_core::emit;
use buckit_core::metrics::events::{MessageDropped, MessageReceived};

use crate::envelope::{RequestContext, ResultRecord};
use crate::error::{
    ConsumeError, FetchSnafu, InboundSnafu, StageError, StoreSnafu, StreamEndedSnafu, UnpackError,
    UnpackSnafu,
};
use crate::fetch::Fetcher;
use crate::handoff::HandoffSender;
use crate::queue::MessageSource;
use crate::store::Storer;
use crate::unpack::{BucketMap, Unpacked, unpack};

pub struct Pipeline {
    buckets: BucketMap,
    fetcher: Arc<dyn Fetcher>,
    storer: Arc<dyn Storer>,
}

impl Pipeline {
    pub fn new(buckets: BucketMap, fetcher: Arc<dyn Fetcher>, storer: Arc<dyn Storer>) -> Self {
        Self {
            buckets,
            fetcher,
            storer,
        }
    }

    /// Run one raw message through every stage.
    ///
    /// Failures are logged and counted here; the caller only decides whether
    /// anything gets forwarded.
    pub async fn process(&self, raw: &[u8]) -> Result<ResultRecord, StageError> {
        emit!(MessageReceived);

        let unpacked = match unpack(raw, &self.buckets).context(UnpackSnafu) {
            Ok(unpacked) => unpacked,
            Err(err) => {
                unpack_span(&err).in_scope(|| report_drop(&err));
                return Err(err);
            }
        };

        let span = unpacked.ctx.span();
        let result = self.transfer(unpacked).instrument(span.clone()).await;
        if let Err(err) = &result {
            span.in_scope(|| report_drop(err));
        }
        result
    }

    async fn transfer(&self, unpacked: Unpacked) -> Result<ResultRecord, StageError> {
        let Unpacked {
            url,
            bucket,
            envelope,
            ctx,
        } = unpacked;

        debug!(%url, service = %envelope.service, %bucket, "Fetching payload");
        let payload = self
            .fetcher
            .fetch(&url)
            .await
            .context(FetchSnafu { url: url.as_str() })?;

        let key = self
            .storer
            .store(payload, &bucket, &envelope, &ctx)
            .await
            .context(StoreSnafu {
                bucket: bucket.as_str(),
            })?;

        info!(%bucket, %key, "Stored payload");
        Ok(ResultRecord::success(envelope))
    }

    /// Consume `source` until `shutdown` is cancelled.
    ///
    /// The message in flight when shutdown arrives is finished first.
    /// Returning drops `handoff`, which lets the forwarder drain and stop.
    pub async fn run<S>(
        &self,
        mut source: S,
        handoff: HandoffSender,
        shutdown: CancellationToken,
    ) -> Result<(), ConsumeError>
    where
        S: MessageSource,
    {
        info!("Consumer loop started");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, consumer loop stopping");
                    return Ok(());
                }
                next = source.recv() => next.context(InboundSnafu)?,
            };

            let Some(raw) = next else {
                return StreamEndedSnafu.fail();
            };

            // Dropped messages were already reported by `process`
            if let Ok(record) = self.process(&raw).await {
                handoff
                    .send(record)
                    .await
                    .map_err(|_| ConsumeError::ForwarderGone)?;
            }
        }
    }
}

/// Attribute an unpack failure to its request when the envelope decoded.
fn unpack_span(err: &StageError) -> Span {
    match err {
        StageError::Unpack {
            source: UnpackError::UnknownService { request_id, .. },
        } => RequestContext::new(request_id.as_str()).span(),
        _ => RequestContext::default().span(),
    }
}

fn report_drop(err: &StageError) {
    let stage = err.stage();
    error!(stage = stage.as_str(), error = %err, "Dropping message");
    if err.is_auth_failure() {
        warn!("Object storage rejected the configured credentials");
    }
    emit!(MessageDropped { stage });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::handoff;
    use crate::queue::MemorySource;
    use crate::store::ObjectStorer;
    use async_trait::async_trait;
    use buckit_core::BucketStorage;
    use bytes::Bytes;
    use std::collections::HashMap;

    /// Serves fixed bodies by URL; anything else answers 404.
    struct StaticFetcher(HashMap<String, &'static [u8]>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            match self.0.get(url) {
                Some(body) => Ok(Bytes::from_static(*body)),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn pipeline(storage: Arc<BucketStorage>) -> Pipeline {
        let buckets = BucketMap::new(HashMap::from([
            ("svcA".to_string(), "bucket1".to_string()),
            ("svcBad".to_string(), "bad/bucket".to_string()),
        ]));
        let fetcher = StaticFetcher(HashMap::from([("http://x".to_string(), &b"payload"[..])]));
        Pipeline::new(buckets, Arc::new(fetcher), Arc::new(ObjectStorer::new(storage)))
    }

    #[tokio::test]
    async fn test_process_stores_and_builds_record() {
        let storage = Arc::new(BucketStorage::in_memory());
        let raw = br#"{"request_id":"r1","url":"http://x","service":"svcA"}"#;

        let record = pipeline(storage.clone()).process(raw).await.unwrap();

        assert_eq!(record.request_id(), "r1");
        assert_eq!(storage.get("bucket1", "r1").await.unwrap().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_process_reports_failing_stage() {
        let storage = Arc::new(BucketStorage::in_memory());
        let pipeline = pipeline(storage.clone());

        let err = pipeline.process(b"garbage").await.unwrap_err();
        assert_eq!(err.stage(), buckit_core::metrics::events::DropStage::Unpack);

        let raw = br#"{"request_id":"r2","url":"http://x","service":"svcB"}"#;
        let err = pipeline.process(raw).await.unwrap_err();
        assert_eq!(err.stage(), buckit_core::metrics::events::DropStage::Unpack);

        let raw = br#"{"request_id":"r3","url":"http://missing","service":"svcA"}"#;
        let err = pipeline.process(raw).await.unwrap_err();
        assert_eq!(err.stage(), buckit_core::metrics::events::DropStage::Fetch);
        assert!(storage.get("bucket1", "r3").await.is_err());

        let raw = br#"{"request_id":"r4","url":"http://x","service":"svcBad"}"#;
        let err = pipeline.process(raw).await.unwrap_err();
        assert_eq!(err.stage(), buckit_core::metrics::events::DropStage::Store);
        assert!(matches!(err, StageError::Store { ref bucket, .. } if bucket == "bad/bucket"));
    }

    #[tokio::test]
    async fn test_process_drops_blank_request_id_before_fetch() {
        let storage = Arc::new(BucketStorage::in_memory());
        let raw = br#"{"request_id":" ","url":"http://x","service":"svcA"}"#;

        let err = pipeline(storage.clone()).process(raw).await.unwrap_err();

        assert_eq!(err.stage(), buckit_core::metrics::events::DropStage::Unpack);
        assert!(matches!(
            err,
            StageError::Unpack {
                source: UnpackError::MissingField { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_run_skips_failures_and_ends_with_stream() {
        let storage = Arc::new(BucketStorage::in_memory());
        let source = MemorySource::from_messages([
            &br#"{"request_id":"r1","url":"http://x","service":"svcA"}"#[..],
            &br#"{"request_id":"r2","url":"http://missing","service":"svcA"}"#[..],
            &br#"{"request_id":"r3","url":"http://x","service":"svcA"}"#[..],
        ]);
        let (tx, mut rx) = handoff::channel(None);

        let err = pipeline(storage)
            .run(source, tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::StreamEnded));

        assert_eq!(rx.recv().await.unwrap().request_id(), "r1");
        assert_eq!(rx.recv().await.unwrap().request_id(), "r3");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_continues_after_store_failure() {
        let storage = Arc::new(BucketStorage::in_memory());
        let source = MemorySource::from_messages([
            &br#"{"request_id":"r1","url":"http://x","service":"svcBad"}"#[..],
            &br#"{"request_id":"r2","url":"http://x","service":"svcA"}"#[..],
        ]);
        let (tx, mut rx) = handoff::channel(None);

        let err = pipeline(storage.clone())
            .run(source, tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::StreamEnded));

        assert_eq!(rx.recv().await.unwrap().request_id(), "r2");
        assert!(rx.recv().await.is_none());
        assert_eq!(storage.get("bucket1", "r2").await.unwrap().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let storage = Arc::new(BucketStorage::in_memory());
        let (_feed, source) = MemorySource::new();
        let (tx, _rx) = handoff::channel(None);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = pipeline(storage).run(source, tx, shutdown).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_when_forwarder_gone() {
        let storage = Arc::new(BucketStorage::in_memory());
        let source = MemorySource::from_messages([
            &br#"{"request_id":"r1","url":"http://x","service":"svcA"}"#[..],
        ]);
        let (tx, rx) = handoff::channel(None);
        drop(rx);

        let err = pipeline(storage)
            .run(source, tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::ForwarderGone));
    }
}
