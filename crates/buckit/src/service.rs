//! Service assembly and supervision.

use std::sync::Arc;

use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use buckit_core::{BucketStorage, LoopExit, Task, run_until_exit, spawn_shutdown_handler};

use crate::config::Config;
use crate::error::{HttpClientSnafu, LoopExitedSnafu, ServiceError};
use crate::fetch::HttpFetcher;
use crate::forward::Forwarder;
use crate::handoff;
use crate::pipeline::Pipeline;
use crate::queue::{KafkaSink, KafkaSource, MessageSource};
use crate::store::ObjectStorer;

/// Name of the consumption loop in exit reports.
pub const CONSUMER_LOOP: &str = "consumer";
/// Name of the forwarding loop in exit reports.
pub const PRODUCER_LOOP: &str = "producer";

/// Run the consumer and producer loops joined by a hand-off queue.
///
/// Returns `Ok` only after `shutdown` is cancelled and both loops have
/// stopped, with every queued record forwarded. Any other exit of either
/// loop is returned as an error.
pub async fn run_loops<S>(
    pipeline: Pipeline,
    source: S,
    forwarder: Forwarder,
    handoff_capacity: Option<usize>,
    shutdown: CancellationToken,
) -> Result<(), LoopExit>
where
    S: MessageSource + 'static,
{
    let (tx, rx) = handoff::channel(handoff_capacity);

    let consumer_shutdown = shutdown.clone();
    let producer_shutdown = shutdown.clone();
    let tasks = vec![
        Task::from_result(CONSUMER_LOOP, async move {
            pipeline.run(source, tx, consumer_shutdown).await
        }),
        Task::from_result(PRODUCER_LOOP, forwarder.run(rx, producer_shutdown)),
    ];

    run_until_exit(tasks, shutdown).await
}

/// Build every component from `config` and run until a signal or a fatal loop exit.
pub async fn run(config: Config) -> Result<(), ServiceError> {
    buckit_core::start_metrics(&config.metrics.address)?;

    let buckets = config.load_buckets();
    if buckets.is_empty() {
        warn!("Bucket map is empty, every message will be dropped");
    } else {
        info!(services = buckets.len(), "Bucket map ready");
    }

    let fetcher = HttpFetcher::new(config.fetch.timeout()).context(HttpClientSnafu)?;
    let storage = Arc::new(BucketStorage::new(config.storage.clone()));
    let pipeline = Pipeline::new(
        buckets,
        Arc::new(fetcher),
        Arc::new(ObjectStorer::new(storage)),
    );

    let source = KafkaSource::new(&config.queue)?;
    let sink = KafkaSink::new(&config.queue)?;
    let forwarder = Forwarder::new(Arc::new(sink), config.queue.produce_topic.clone());

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());

    info!(
        consume = %config.queue.consume_topic,
        produce = %config.queue.produce_topic,
        "Starting buckit"
    );

    run_loops(
        pipeline,
        source,
        forwarder,
        config.handoff.capacity,
        shutdown,
    )
    .await
    .context(LoopExitedSnafu)?;

    info!("Shutdown complete");
    Ok(())
}
