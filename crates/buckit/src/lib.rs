//! buckit: Upload stage that copies payloads into per-service buckets.
//!
//! This crate handles:
//! - Consuming upload notifications from Kafka
//! - Routing each notification to a bucket by its `service`
//! - Fetching the payload over HTTP and writing it to object storage
//! - Publishing a `validation: success` record for each stored payload

pub mod config;
pub mod envelope;
pub mod error;
pub mod fetch;
pub mod forward;
pub mod handoff;
pub mod key;
pub mod pipeline;
pub mod queue;
pub mod service;
pub mod store;
pub mod unpack;

pub use config::Config;
pub use envelope::{Envelope, ObjectKey, RequestContext, ResultRecord};
pub use error::ServiceError;
pub use forward::Forwarder;
pub use pipeline::Pipeline;
pub use service::{run, run_loops};
pub use unpack::BucketMap;

pub use buckit_core::{CliArgs, init_tracing};
