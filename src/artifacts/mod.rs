//! Artifact repositories
//!
//! An artifact repository stores files produced by a training job. Each
//! repository is scoped to a prefix (the job id for the models client) and
//! uploads whole directories under `<scope>/<artifact_path>/`.
//!
//! # Example
//!
//! ```rust,no_run
//! use submarine_models::artifacts::{ArtifactRepository, LocalArtifactRepository};
//!
//! # async fn example() -> submarine_models::Result<()> {
//! let repo = LocalArtifactRepository::new("/var/lib/submarine/artifacts", "job-1");
//! repo.log_artifacts("/tmp/exported-model".as_ref(), "mnist").await?;
//! println!("{:?}", repo.list_artifacts("mnist")?);
//! # Ok(())
//! # }
//! ```

mod http;
mod local;
mod s3;

pub use http::HttpArtifactRepository;
pub use local::LocalArtifactRepository;
pub use s3::S3ArtifactRepository;

use std::future::Future;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Letters, digits, hyphen and underscore; alphanumeric at both ends.
static ARTIFACT_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Za-z]([0-9A-Za-z_-]*[0-9A-Za-z])?$").expect("artifact path pattern is valid")
});

/// Storage for files produced by a job.
pub trait ArtifactRepository: Send + Sync {
    /// Upload every file below `local_dir` to `artifact_path`, keeping the
    /// relative layout.
    fn log_artifacts(
        &self,
        local_dir: &Path,
        artifact_path: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Check an artifact path against the naming rules.
///
/// # Errors
///
/// Returns `Error::InvalidArtifactPath` if `artifact_path` contains anything
/// other than ASCII letters, digits, `-` and `_`, or does not start and end
/// with a letter or digit.
pub fn validate_artifact_path(artifact_path: &str) -> Result<()> {
    if ARTIFACT_PATH_PATTERN.is_match(artifact_path) {
        Ok(())
    } else {
        Err(Error::InvalidArtifactPath(artifact_path.to_string()))
    }
}

/// A file found below an upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the upload root, `/`-separated.
    pub relative: String,
}

/// List the regular files below `root`, sorted by relative path.
///
/// # Errors
///
/// Returns `Error::Io` if the directory cannot be walked.
pub fn collect_files(root: &Path) -> Result<Vec<ArtifactFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(ArtifactFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }
    Ok(files)
}

/// [`collect_files`] on the blocking pool, for use inside async uploads.
pub(crate) async fn walk_files(root: &Path) -> Result<Vec<ArtifactFile>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || collect_files(&root))
        .await
        .map_err(std::io::Error::other)?
}

/// Join non-empty path segments with `/`, trimming stray slashes.
pub(crate) fn join_remote(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_artifact_path_accepts() {
        for path in ["a", "7", "model", "my-model_v2", "A_b-C"] {
            assert!(validate_artifact_path(path).is_ok(), "{path}");
        }
    }

    #[test]
    fn test_validate_artifact_path_rejects() {
        for path in ["", "-model", "model-", "_m", "m_", "my model", "a/b", "mödel", "a\n"] {
            let err = validate_artifact_path(path).unwrap_err();
            assert!(matches!(err, Error::InvalidArtifactPath(_)), "{path:?}");
        }
    }

    #[test]
    fn test_collect_files_nested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("1/model.savedmodel")).unwrap();
        std::fs::write(dir.path().join("1/model.savedmodel/saved_model.pb"), b"pb").unwrap();
        std::fs::write(dir.path().join("MLmodel"), b"{}").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(relative, ["1/model.savedmodel/saved_model.pb", "MLmodel"]);
    }

    #[tokio::test]
    async fn test_walk_files_matches_collect_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/model.pth"), b"weights").unwrap();

        let walked = walk_files(dir.path()).await.unwrap();
        assert_eq!(walked, collect_files(dir.path()).unwrap());
        assert_eq!(walked[0].relative, "data/model.pth");
    }

    #[tokio::test]
    async fn test_walk_files_missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = walk_files(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote(&["job-1/", "", "/model", "1/model.pt"]), "job-1/model/1/model.pt");
    }
}
