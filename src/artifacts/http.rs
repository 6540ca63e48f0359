//! Artifact repository behind the tracking server's artifact proxy.
//!
//! Files are uploaded with one `PUT` each to
//! `{endpoint}/api/2.0/mlflow-artifacts/artifacts/{scope}/{artifact_path}/{file}`.
//! The proxy holds the object store credentials, so requests carry none.

use std::path::Path;

use reqwest::Client;
use tracing::{debug, info};

use super::{join_remote, walk_files, ArtifactRepository};
use crate::config::ClientConfig;
use crate::{http, Result};

const ARTIFACTS_ROUTE: &str = "api/2.0/mlflow-artifacts/artifacts";

/// Artifact repository that uploads through the tracking server.
#[derive(Debug, Clone)]
pub struct HttpArtifactRepository {
    client: Client,
    endpoint: String,
    scope: String,
}

impl HttpArtifactRepository {
    /// Create a repository for `scope` on the tracking server from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig, scope: &str) -> Result<Self> {
        Ok(Self::with_client(
            http::build_client(config.request_timeout())?,
            config.tracking_uri(),
            scope,
        ))
    }

    /// Create a repository from an existing client.
    #[must_use]
    pub fn with_client(client: Client, endpoint: &str, scope: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            scope: scope.trim_matches('/').to_string(),
        }
    }

    /// URL a file at `relative` below `artifact_path` is uploaded to.
    #[must_use]
    pub fn artifact_url(&self, artifact_path: &str, relative: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint,
            join_remote(&[ARTIFACTS_ROUTE, &self.scope, artifact_path, relative])
        )
    }
}

impl ArtifactRepository for HttpArtifactRepository {
    async fn log_artifacts(&self, local_dir: &Path, artifact_path: &str) -> Result<()> {
        let files = walk_files(local_dir).await?;
        for file in &files {
            let url = self.artifact_url(artifact_path, &file.relative);
            let body = tokio::fs::read(&file.path).await?;
            debug!(url = %url, bytes = body.len(), "uploading artifact");

            http::check(self.client.put(&url).body(body).send().await?).await?;
        }
        info!(scope = %self.scope, artifact_path, files = files.len(), "artifacts uploaded");
        Ok(())
    }
}
