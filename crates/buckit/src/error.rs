//! Error types for the buckit upload stage.
//!
//! Unpack, fetch and store errors are per-message: the pipeline logs them and
//! drops the message. Queue, forward and loop errors end a long-running loop
//! and are fatal for the process.

use snafu::prelude::*;

use buckit_core::metrics::events::DropStage;
pub use buckit_core::error::{ConfigError, SetupError, StorageError};

/// Errors turning a raw queue message into a routable envelope.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UnpackError {
    /// Payload is not a JSON envelope with the required string fields.
    #[snafu(display("Malformed envelope: {source}"))]
    Decode { source: serde_json::Error },

    /// A required field is present but blank.
    #[snafu(display("Envelope field '{field}' is empty"))]
    MissingField { field: &'static str },

    /// The envelope's service has no bucket mapping.
    #[snafu(display("No bucket mapped for service '{service}' (request_id={request_id})"))]
    UnknownService { service: String, request_id: String },
}

/// Errors retrieving a payload from its origin.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure.
    #[snafu(display("Request to '{url}' failed: {source}"))]
    Request { url: String, source: reqwest::Error },

    /// Origin answered with a non-success status.
    #[snafu(display("Origin returned {status} for '{url}'"))]
    Status { url: String, status: u16 },

    /// Response body could not be read to completion.
    #[snafu(display("Failed to read body from '{url}': {source}"))]
    Body { url: String, source: reqwest::Error },

    /// Failed to build the HTTP client.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    Client { source: reqwest::Error },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Request { source, .. } | FetchError::Body { source, .. } => {
                source.is_timeout()
            }
            _ => false,
        }
    }
}

/// Errors persisting a payload.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Failed to write '{bucket}/{key}': {source}"))]
    Write {
        bucket: String,
        key: String,
        source: StorageError,
    },
}

impl StoreError {
    /// Whether the backend rejected the configured credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            StoreError::Write { source, .. } => source.is_auth_failure(),
        }
    }
}

/// Errors from the message queue client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// Kafka client could not be created or subscribed.
    #[snafu(display("Failed to set up Kafka client: {source}"))]
    KafkaSetup {
        source: rdkafka::error::KafkaError,
    },

    /// Receiving from the inbound topic failed.
    #[snafu(display("Failed to receive from '{topic}': {source}"))]
    Receive {
        topic: String,
        source: rdkafka::error::KafkaError,
    },

    /// The broker did not acknowledge a published message.
    #[snafu(display("Failed to publish to '{topic}': {source}"))]
    Deliver {
        topic: String,
        source: rdkafka::error::KafkaError,
    },

    /// The queue client has been shut down.
    #[snafu(display("Queue client closed"))]
    Closed,
}

/// A per-message failure at one pipeline stage. The message is dropped.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StageError {
    #[snafu(display("Failed to unpack message: {source}"))]
    Unpack { source: UnpackError },

    #[snafu(display("Failed to fetch '{url}': {source}"))]
    Fetch { url: String, source: FetchError },

    #[snafu(display("Failed to store to '{bucket}': {source}"))]
    Store { bucket: String, source: StoreError },
}

impl StageError {
    /// The stage the message was dropped at.
    pub fn stage(&self) -> DropStage {
        match self {
            StageError::Unpack { .. } => DropStage::Unpack,
            StageError::Fetch { .. } => DropStage::Fetch,
            StageError::Store { .. } => DropStage::Store,
        }
    }

    /// Whether the failure came from storage refusing our credentials.
    ///
    /// Every following message will fail the same way until the
    /// credentials are fixed.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            StageError::Store { source, .. } => source.is_auth_failure(),
            _ => false,
        }
    }
}

/// Errors that end the consumption loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConsumeError {
    /// The inbound queue client failed.
    #[snafu(display("Inbound queue failed: {source}"))]
    Inbound { source: QueueError },

    /// The inbound stream ended.
    #[snafu(display("Inbound stream ended"))]
    StreamEnded,

    /// The forwarder dropped its end of the hand-off queue.
    #[snafu(display("Hand-off queue closed by the forwarder"))]
    ForwarderGone,
}

/// Errors that end the forwarding loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ForwardError {
    /// A result record could not be serialized.
    #[snafu(display("Failed to serialize result for request_id={request_id}: {source}"))]
    Serialize {
        request_id: String,
        source: serde_json::Error,
    },

    /// Publishing a result failed.
    #[snafu(display("Failed to forward result for request_id={request_id}: {source}"))]
    Publish {
        request_id: String,
        source: QueueError,
    },

    /// The pipeline dropped its end of the hand-off queue without shutdown.
    #[snafu(display("Hand-off queue closed by the pipeline"))]
    PipelineGone,
}

/// Top-level errors for the service binary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    #[snafu(display("Setup error: {source}"))]
    Setup { source: SetupError },

    #[snafu(display("Queue error: {source}"))]
    Queue { source: QueueError },

    #[snafu(display("HTTP client error: {source}"))]
    HttpClient { source: FetchError },

    /// A long-running loop exited; the process must terminate.
    #[snafu(display("{source}"))]
    LoopExited { source: buckit_core::LoopExit },
}

impl From<ConfigError> for ServiceError {
    fn from(source: ConfigError) -> Self {
        ServiceError::Config { source }
    }
}

impl From<SetupError> for ServiceError {
    fn from(source: SetupError) -> Self {
        ServiceError::Setup { source }
    }
}

impl From<QueueError> for ServiceError {
    fn from(source: QueueError) -> Self {
        ServiceError::Queue { source }
    }
}
