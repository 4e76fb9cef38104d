//! Message queue seams.
//!
//! The pipeline reads raw messages from a [`MessageSource`] and the
//! forwarder publishes through a [`MessageSink`]. Kafka implements both in
//! production; the in-memory versions back tests and local runs.

pub mod kafka;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::QueueError;

pub use kafka::{KafkaSink, KafkaSource};
pub use memory::{MemorySink, MemorySource};

/// An ordered stream of raw inbound messages.
#[async_trait]
pub trait MessageSource: Send {
    /// Next message value, or `None` once the stream has ended.
    ///
    /// Messages without a value are yielded as empty payloads.
    async fn recv(&mut self) -> Result<Option<Bytes>, QueueError>;
}

/// Publishes messages and waits for the broker to acknowledge them.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_and_wait(&self, topic: &str, payload: Vec<u8>) -> Result<(), QueueError>;
}
