//! Internal events for buckit metrics emission.
//!
//! Each event struct represents a measurable occurrence in the upload stage.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Pipeline stage at which a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStage {
    Unpack,
    Fetch,
    Store,
}

impl DropStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropStage::Unpack => "unpack",
            DropStage::Fetch => "fetch",
            DropStage::Store => "store",
        }
    }
}

impl std::fmt::Display for DropStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted when a raw message is taken off the inbound queue.
pub struct MessageReceived;

impl InternalEvent for MessageReceived {
    fn emit(self) {
        trace!("Message received");
        counter!("buckit_messages_received_total").increment(1);
    }
}

/// Event emitted when a message is abandoned by the pipeline.
pub struct MessageDropped {
    pub stage: DropStage,
}

impl InternalEvent for MessageDropped {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "Message dropped");
        counter!("buckit_messages_dropped_total", "stage" => self.stage.as_str()).increment(1);
    }
}

/// Event emitted once the inbound JSON document has been decoded.
pub struct EnvelopeDecoded {
    pub duration: Duration,
}

impl InternalEvent for EnvelopeDecoded {
    fn emit(self) {
        trace!(duration_us = self.duration.as_micros(), "Envelope decoded");
        histogram!("buckit_json_decode_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a payload fetch from its origin finishes.
pub struct PayloadFetched {
    pub duration: Duration,
}

impl InternalEvent for PayloadFetched {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Payload fetched");
        histogram!("buckit_fetch_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a payload has been written to a bucket.
pub struct PayloadStored {
    pub bytes: u64,
    pub bucket: String,
}

impl InternalEvent for PayloadStored {
    fn emit(self) {
        trace!(bytes = self.bytes, bucket = %self.bucket, "Payload stored");
        histogram!("buckit_payload_size_bytes").record(self.bytes as f64);
        counter!("buckit_bucket_writes_total", "bucket" => self.bucket).increment(1);
    }
}

/// Event emitted when an object store write finishes (success or failure).
pub struct StoreCompleted {
    pub duration: Duration,
}

impl InternalEvent for StoreCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Store completed");
        histogram!("buckit_s3_write_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a validation result is acknowledged by the broker.
pub struct ResultForwarded;

impl InternalEvent for ResultForwarded {
    fn emit(self) {
        trace!("Result forwarded");
        counter!("buckit_results_forwarded_total").increment(1);
    }
}

/// Event emitted to track results waiting in the hand-off queue.
pub struct HandoffDepth {
    pub count: usize,
}

impl InternalEvent for HandoffDepth {
    fn emit(self) {
        trace!(count = self.count, "Hand-off depth");
        gauge!("buckit_handoff_depth").set(self.count as f64);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
}

impl StorageOperation {
    fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
        }
    }
}

/// Request status for storage operations.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted for each object store request.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "buckit_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}
