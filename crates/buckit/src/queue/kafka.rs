//! Kafka adapters built on `rdkafka`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use snafu::prelude::*;
use tracing::info;

use super::{MessageSink, MessageSource};
use crate::config::QueueConfig;
use crate::error::{KafkaSetupSnafu, QueueError, ReceiveSnafu};

/// Base client settings. Entries in `config.properties` override `defaults`.
fn client_config(config: &QueueConfig, defaults: &[(&str, &str)]) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", config.brokers.as_str());
    for (key, value) in defaults {
        client.set(*key, *value);
    }
    for (key, value) in &config.properties {
        client.set(key.as_str(), value.as_str());
    }
    client
}

/// Consumer-group member subscribed to the inbound topic.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = client_config(
            config,
            &[
                ("group.id", config.group_id.as_str()),
                ("enable.partition.eof", "false"),
                ("enable.auto.commit", "true"),
                ("auto.offset.reset", config.auto_offset_reset.as_str()),
            ],
        );

        let consumer: StreamConsumer = client.create().context(KafkaSetupSnafu)?;
        consumer
            .subscribe(&[config.consume_topic.as_str()])
            .context(KafkaSetupSnafu)?;

        info!(
            brokers = %config.brokers,
            group = %config.group_id,
            topic = %config.consume_topic,
            "Subscribed to inbound topic"
        );

        Ok(Self {
            consumer,
            topic: config.consume_topic.clone(),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn recv(&mut self) -> Result<Option<Bytes>, QueueError> {
        let message = self.consumer.recv().await.context(ReceiveSnafu {
            topic: self.topic.as_str(),
        })?;
        let payload = message.payload().unwrap_or_default();
        Ok(Some(Bytes::copy_from_slice(payload)))
    }
}

/// Producer that awaits broker acknowledgement for every record.
pub struct KafkaSink {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaSink {
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let producer: FutureProducer = client_config(config, &[])
            .create()
            .context(KafkaSetupSnafu)?;
        Ok(Self {
            producer,
            delivery_timeout: Duration::from_secs(config.delivery_timeout_secs),
        })
    }
}

#[async_trait]
impl MessageSink for KafkaSink {
    async fn send_and_wait(&self, topic: &str, payload: Vec<u8>) -> Result<(), QueueError> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload.as_slice());
        self.producer
            .send(record, self.delivery_timeout)
            .await
            .map(|_| ())
            .map_err(|(source, _)| QueueError::Deliver {
                topic: topic.to_string(),
                source,
            })
    }
}
