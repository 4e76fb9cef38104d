//! S3 storage backend implementation.

use object_store::aws::AmazonS3Builder;
use object_store::{ObjectStore, RetryConfig};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{S3ConfigSnafu, StorageError};

/// S3 storage configuration shared by every bucket the service writes to.
///
/// Credentials come from the standard AWS environment variables
/// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, ...) unless overridden in
/// `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, Ceph).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Raw `object_store` S3 options, e.g. `aws_access_key_id`.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            options: HashMap::new(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

pub(super) fn build_s3(
    config: &S3Config,
    bucket: &str,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(&config.region);

    for (key, value) in &config.options {
        builder = builder.with_config(
            key.parse().context(S3ConfigSnafu { bucket })?,
            value.trim(),
        );
    }

    builder = builder.with_retry(RetryConfig::default());

    if let Some(endpoint) = &config.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    let store = builder.build().context(S3ConfigSnafu { bucket })?;
    Ok(Arc::new(store))
}
