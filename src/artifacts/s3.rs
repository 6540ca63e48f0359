//! Artifact repository on an S3-compatible object store.
//!
//! Files are written to `{bucket}/{scope}/{artifact_path}/{file}` using the
//! configured access key pair. Path-style addressing is used so MinIO works
//! without virtual-host DNS.

use std::path::Path;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectStorePath;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use tracing::{debug, info};

use super::{join_remote, walk_files, ArtifactRepository};
use crate::config::{ClientConfig, DEFAULT_ARTIFACT_REGION};
use crate::Result;

/// Artifact repository backed by an object store bucket.
#[derive(Debug, Clone)]
pub struct S3ArtifactRepository {
    store: Arc<dyn ObjectStore>,
    scope: String,
}

impl S3ArtifactRepository {
    /// Create a repository for `scope` in the bucket at
    /// `config.registry_uri()`, signed with `config.credentials()`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ObjectStore` if the store settings are rejected.
    pub fn new(config: &ClientConfig, scope: &str) -> Result<Self> {
        let store = AmazonS3Builder::new()
            .with_endpoint(config.registry_uri())
            .with_bucket_name(config.artifact_bucket())
            .with_region(DEFAULT_ARTIFACT_REGION)
            .with_access_key_id(config.credentials().access_key_id())
            .with_secret_access_key(config.credentials().secret_access_key())
            .with_allow_http(config.registry_uri().starts_with("http://"))
            .build()?;
        Ok(Self::with_store(Arc::new(store), scope))
    }

    /// Create a repository on an existing store.
    #[must_use]
    pub fn with_store(store: Arc<dyn ObjectStore>, scope: &str) -> Self {
        Self {
            store,
            scope: scope.trim_matches('/').to_string(),
        }
    }

    /// Object key a file at `relative` below `artifact_path` is written to.
    #[must_use]
    pub fn object_path(&self, artifact_path: &str, relative: &str) -> ObjectStorePath {
        ObjectStorePath::from(join_remote(&[&self.scope, artifact_path, relative]))
    }
}

impl ArtifactRepository for S3ArtifactRepository {
    async fn log_artifacts(&self, local_dir: &Path, artifact_path: &str) -> Result<()> {
        let files = walk_files(local_dir).await?;
        for file in &files {
            let object_path = self.object_path(artifact_path, &file.relative);
            let body = tokio::fs::read(&file.path).await?;
            debug!(key = %object_path, bytes = body.len(), "uploading artifact");
            self.store.put(&object_path, PutPayload::from(body)).await?;
        }
        info!(scope = %self.scope, artifact_path, files = files.len(), "artifacts uploaded");
        Ok(())
    }
}
