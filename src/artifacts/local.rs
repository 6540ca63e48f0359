//! Filesystem artifact repository.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{collect_files, walk_files, ArtifactRepository};
use crate::Result;

/// Artifact repository rooted in a local directory.
///
/// Files land in `root/<scope>/<artifact_path>/...`. Useful for local
/// training and as a stand-in for object storage in tests.
#[derive(Debug, Clone)]
pub struct LocalArtifactRepository {
    base: PathBuf,
}

impl LocalArtifactRepository {
    /// Create a repository for `scope` below `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>, scope: &str) -> Self {
        Self {
            base: root.as_ref().join(scope),
        }
    }

    /// Directory that holds this repository's artifacts.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Relative paths of the files stored under `artifact_path`, sorted.
    /// Empty if nothing has been uploaded there.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory exists but cannot be read.
    pub fn list_artifacts(&self, artifact_path: &str) -> Result<Vec<String>> {
        let dir = self.base.join(artifact_path);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        Ok(collect_files(&dir)?
            .into_iter()
            .map(|file| file.relative)
            .collect())
    }
}

impl ArtifactRepository for LocalArtifactRepository {
    async fn log_artifacts(&self, local_dir: &Path, artifact_path: &str) -> Result<()> {
        let dest = self.base.join(artifact_path);
        for file in walk_files(local_dir).await? {
            let target = dest.join(&file.relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&file.path, &target).await?;
            debug!(source = %file.path.display(), target = %target.display(), "artifact stored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_artifacts_preserves_layout() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("1")).unwrap();
        std::fs::write(src.path().join("1/model.pt"), b"weights").unwrap();

        let root = tempfile::tempdir().unwrap();
        let repo = LocalArtifactRepository::new(root.path(), "job-1");
        repo.log_artifacts(src.path(), "mnist").await.unwrap();

        assert_eq!(repo.list_artifacts("mnist").unwrap(), ["1/model.pt"]);
        let stored = std::fs::read(root.path().join("job-1/mnist/1/model.pt")).unwrap();
        assert_eq!(stored, b"weights");
    }

    #[test]
    fn test_list_missing_path_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let repo = LocalArtifactRepository::new(root.path(), "job-1");
        assert!(repo.list_artifacts("nothing").unwrap().is_empty());
    }
}
