//! Inbound envelope, per-message context and outbound result record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::Span;

/// Correlation id used before any message has been unpacked.
pub const UNSET_REQUEST_ID: &str = "-1";

/// A decoded upload notification.
///
/// Only the fields buckit needs are typed; everything else is carried
/// through untouched to the validation topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub request_id: String,
    pub url: String,
    pub service: String,
    /// Base64 of a JSON identity document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_identity: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Correlation context for one unit of work.
///
/// Threaded explicitly through unpacking, key derivation and logging so no
/// process-wide state is shared between messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Span that attributes every log line inside it to this request.
    pub fn span(&self) -> Span {
        tracing::info_span!("message", request_id = %self.request_id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(UNSET_REQUEST_ID)
    }
}

/// Status attached to forwarded results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    Success,
}

/// A stored envelope, ready to be forwarded downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub validation: Validation,
    #[serde(flatten)]
    pub envelope: Envelope,
}

impl ResultRecord {
    /// Build the success record for a stored envelope.
    ///
    /// An inbound `validation` field is replaced so the outbound document
    /// never carries two values for it.
    pub fn success(mut envelope: Envelope) -> Self {
        envelope.extra.remove("validation");
        Self {
            validation: Validation::Success,
            envelope,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.envelope.request_id
    }
}

/// Key under which a payload is written in its bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ObjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
