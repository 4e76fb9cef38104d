//! Local filesystem storage backend implementation.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

/// Local filesystem configuration. Each bucket is a directory under `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    pub root: PathBuf,
}

pub(super) async fn build_local(
    config: &LocalConfig,
    bucket: &str,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let dir = config.root.join(bucket);
    tokio::fs::create_dir_all(&dir).await.context(IoSnafu)?;

    let store = LocalFileSystem::new_with_prefix(&dir).context(ObjectStoreSnafu)?;
    Ok(Arc::new(store))
}
