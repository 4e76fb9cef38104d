//! The forwarding loop: publish result records to the validation topic.

use std::sync::Arc;

use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info};

use buckit_core::emit;
use buckit_core::metrics::events::ResultForwarded;

use crate::envelope::{RequestContext, ResultRecord};
use crate::error::{ForwardError, PipelineGoneSnafu, PublishSnafu, SerializeSnafu};
use crate::handoff::HandoffReceiver;
use crate::queue::MessageSink;

pub struct Forwarder {
    sink: Arc<dyn MessageSink>,
    topic: String,
}

impl Forwarder {
    pub fn new(sink: Arc<dyn MessageSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    /// Publish one record and wait for the acknowledgement.
    pub async fn forward(&self, record: &ResultRecord) -> Result<(), ForwardError> {
        let request_id = record.request_id();
        let payload = serde_json::to_vec(record).context(SerializeSnafu { request_id })?;

        self.sink
            .send_and_wait(&self.topic, payload)
            .await
            .context(PublishSnafu { request_id })?;

        debug!(topic = %self.topic, "Result forwarded");
        emit!(ResultForwarded);
        Ok(())
    }

    /// Drain `handoff` in FIFO order until the pipeline drops its end.
    ///
    /// Records still queued at shutdown are published before returning. A
    /// publish failure ends the loop.
    pub async fn run(
        self,
        mut handoff: HandoffReceiver,
        shutdown: CancellationToken,
    ) -> Result<(), ForwardError> {
        info!(topic = %self.topic, "Forwarder loop started");

        while let Some(record) = handoff.recv().await {
            let span = RequestContext::new(record.request_id()).span();
            self.forward(&record).instrument(span).await?;
        }

        ensure!(shutdown.is_cancelled(), PipelineGoneSnafu);
        info!("Hand-off queue drained, forwarder loop stopping");
        Ok(())
    }
}
