//! Channel-backed queue endpoints.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{MessageSink, MessageSource};
use crate::error::QueueError;

/// Source fed through an mpsc channel. Ends when every sender is dropped.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl MemorySource {
    pub fn new() -> (mpsc::UnboundedSender<Bytes>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// A source that yields `messages` in order and then ends.
    pub fn from_messages<I, B>(messages: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let (tx, source) = Self::new();
        for message in messages {
            // Receiver is held by `source`, so this cannot fail
            let _ = tx.send(message.into());
        }
        source
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Bytes>, QueueError> {
        Ok(self.rx.recv().await)
    }
}

/// Sink that records every published message.
#[derive(Clone, Default)]
pub struct MemorySink {
    sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published `(topic, payload)` pairs in publish order.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send_and_wait(&self, topic: &str, payload: Vec<u8>) -> Result<(), QueueError> {
        let mut sent = self.sent.lock().map_err(|_| QueueError::Closed)?;
        sent.push((topic.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_source_yields_in_order_then_ends() {
        let mut source = MemorySource::from_messages([&b"one"[..], &b"two"[..]]);
        assert_eq!(source.recv().await.unwrap().unwrap().as_ref(), b"one");
        assert_eq!(source.recv().await.unwrap().unwrap().as_ref(), b"two");
        assert!(source.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sink_records_topic_and_payload() {
        let sink = MemorySink::new();
        sink.send_and_wait("t", b"x".to_vec()).await.unwrap();
        assert_eq!(sink.sent(), vec![("t".to_string(), b"x".to_vec())]);
    }
}
