//! Models client facade for distributed training jobs.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::coordination::resolve_experiment;
use super::serializer::{write_model_file, write_tracking_layout};
use super::{MlModel, Model, ModelType};
use crate::artifacts::{validate_artifact_path, ArtifactRepository, S3ArtifactRepository};
use crate::config::ClientConfig;
use crate::entities::{Metric, ModelStage, ModelVersion, Param, Run, RunStatus};
use crate::environment::JobContext;
use crate::tracking::{RestTrackingBackend, TrackingBackend};
use crate::{Error, Result};

/// Handle to a registered model version, ready to be loaded by a model
/// server or downloaded from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
    model_uri: String,
    model_version: ModelVersion,
}

impl LoadedModel {
    /// Registry URI, `models:/{name}/{version}`.
    #[must_use]
    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }

    /// Where the model artifacts live.
    #[must_use]
    pub fn source(&self) -> &str {
        self.model_version.source()
    }

    /// The registry entry backing this model.
    #[must_use]
    pub const fn model_version(&self) -> &ModelVersion {
        &self.model_version
    }
}

/// Client used by each worker of a training job to track its run and
/// persist models.
///
/// The experiment is named after the job id and each worker logs into a
/// run named after its worker id. Run-scoped calls need `start()` first.
///
/// # Example
///
/// ```rust
/// use submarine_models::artifacts::LocalArtifactRepository;
/// use submarine_models::environment::{JobContext, WorkerRole};
/// use submarine_models::tracking::MemoryTrackingBackend;
/// use submarine_models::{ClientConfig, ModelsClient};
///
/// # async fn example() -> submarine_models::Result<()> {
/// let context = JobContext::new("job-1", "worker-0", WorkerRole::Leader);
/// let artifacts = LocalArtifactRepository::new(std::env::temp_dir(), context.job_id());
/// let mut client = ModelsClient::new(
///     ClientConfig::default(),
///     context,
///     MemoryTrackingBackend::new(),
///     artifacts,
/// );
///
/// client.start().await?;
/// client.log_param("batch_size", "64").await?;
/// client.log_metric("loss", 0.42, Some(1)).await?;
/// client
///     .save_model("pytorch", b"weights".as_slice(), "model", Some("mnist"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ModelsClient<B, R> {
    config: ClientConfig,
    context: JobContext,
    backend: B,
    artifacts: R,
    active_run: Option<Run>,
}

impl ModelsClient<RestTrackingBackend, S3ArtifactRepository> {
    /// Connect to the tracking server and the S3-compatible artifact store
    /// in `config`, with the job identity taken from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` for a malformed `TF_CONFIG`, `Error::Http` if
    /// the HTTP client cannot be created and `Error::ObjectStore` if the
    /// artifact store settings are rejected.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let context = JobContext::from_env()?;
        let backend = RestTrackingBackend::new(&config)?;
        let artifacts = S3ArtifactRepository::new(&config, context.job_id())?;
        Ok(Self::new(config, context, backend, artifacts))
    }
}

impl<B: TrackingBackend, R: ArtifactRepository> ModelsClient<B, R> {
    /// Create a client from its collaborators. `artifacts` should be scoped
    /// to `context.job_id()`.
    #[must_use]
    pub const fn new(config: ClientConfig, context: JobContext, backend: B, artifacts: R) -> Self {
        Self {
            config,
            context,
            backend,
            artifacts,
            active_run: None,
        }
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the job identity.
    #[must_use]
    pub const fn context(&self) -> &JobContext {
        &self.context
    }

    /// Get the tracking backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the job's artifact repository.
    #[must_use]
    pub const fn artifacts(&self) -> &R {
        &self.artifacts
    }

    /// Get the active run, if `start()` has been called.
    #[must_use]
    pub const fn active_run(&self) -> Option<&Run> {
        self.active_run.as_ref()
    }

    fn run(&self) -> Result<&Run> {
        self.active_run.as_ref().ok_or(Error::NoActiveRun)
    }

    /// Join the job's experiment and start this worker's run.
    ///
    /// The leader creates the experiment if it does not exist yet; other
    /// workers wait for it according to the configured poll policy.
    ///
    /// # Errors
    ///
    /// Propagates backend errors, and `Error::ExperimentWaitTimeout` from a
    /// bounded poll policy.
    pub async fn start(&mut self) -> Result<&Run> {
        let experiment_id = resolve_experiment(
            &self.backend,
            self.context.job_id(),
            self.context.role(),
            self.config.poll_policy(),
        )
        .await?;
        let run = self
            .backend
            .create_run(&experiment_id, self.context.worker_id())
            .await?;
        info!(
            job_id = self.context.job_id(),
            worker = self.context.worker_id(),
            experiment_id = %experiment_id,
            run_id = run.run_id(),
            "run started"
        );
        Ok(self.active_run.insert(run))
    }

    /// End the active run with `status`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveRun` without an active run; propagates
    /// backend errors (the run stays active in that case).
    pub async fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let run_id = self.run()?.run_id().to_string();
        self.backend.update_run(&run_id, status).await?;
        self.active_run = None;
        info!(run_id = %run_id, status = %status, "run ended");
        Ok(())
    }

    /// Log a parameter to the active run.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveRun` without an active run; propagates
    /// backend errors.
    pub async fn log_param(&self, key: &str, value: &str) -> Result<()> {
        let run = self.run()?;
        self.backend.log_param(run.run_id(), key, value).await
    }

    /// Log several parameters to the active run in one call.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveRun` without an active run; propagates
    /// backend errors.
    pub async fn log_params<I, K, V>(&self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let run = self.run()?;
        let params: Vec<Param> = params
            .into_iter()
            .map(|(key, value)| Param::new(key, value))
            .collect();
        self.backend.log_batch(run.run_id(), &params, &[]).await
    }

    /// Log a metric to the active run. A missing `step` is logged as 0.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveRun` without an active run; propagates
    /// backend errors.
    pub async fn log_metric(&self, key: &str, value: f64, step: Option<i64>) -> Result<()> {
        let run = self.run()?;
        let metric = Metric::new(
            key,
            value,
            self.context.worker_id(),
            Utc::now(),
            step.unwrap_or(0),
        );
        self.backend.log_metric(run.run_id(), &metric).await
    }

    /// Log several metrics at the same step to the active run in one call.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveRun` without an active run; propagates
    /// backend errors.
    pub async fn log_metrics<I, K>(&self, metrics: I, step: Option<i64>) -> Result<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let run = self.run()?;
        let now = Utc::now();
        let step = step.unwrap_or(0);
        let metrics: Vec<Metric> = metrics
            .into_iter()
            .map(|(key, value)| Metric::new(key, value, self.context.worker_id(), now, step))
            .collect();
        self.backend.log_batch(run.run_id(), &[], &metrics).await
    }

    /// All values logged for `key` in the active run.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveRun` without an active run; propagates
    /// backend errors.
    pub async fn metric_history(&self, key: &str) -> Result<Vec<Metric>> {
        let run = self.run()?;
        self.backend.get_metric_history(run.run_id(), key).await
    }

    /// Resolve a registered model version.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the version does not exist.
    pub async fn load_model(&self, name: &str, version: i64) -> Result<LoadedModel> {
        let model_version = self.backend.get_model_version(name, version).await?;
        Ok(LoadedModel {
            model_uri: format!("models:/{name}/{version}"),
            model_version,
        })
    }

    /// Rename a registered model.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `name` is not registered.
    pub async fn update_model(&self, name: &str, new_name: &str) -> Result<()> {
        self.backend.rename_registered_model(name, new_name).await?;
        info!(name, new_name, "registered model renamed");
        Ok(())
    }

    /// Delete one version of a registered model.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the version does not exist.
    pub async fn delete_model(&self, name: &str, version: i64) -> Result<()> {
        self.backend.delete_model_version(name, version).await?;
        info!(name, version, "model version deleted");
        Ok(())
    }

    /// Move a model version to another lifecycle stage.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the version does not exist.
    pub async fn transition_model_stage(
        &self,
        name: &str,
        version: i64,
        stage: ModelStage,
    ) -> Result<ModelVersion> {
        self.backend
            .transition_model_version_stage(name, version, stage)
            .await
    }

    /// Log `model` to the active run under `artifact_path`, optionally
    /// registering it as a new version of `registered_model_name`.
    ///
    /// Only the leader saves. Other workers return `Ok(())` without doing
    /// anything, as does every worker of a parameter-server job, whose
    /// model saving is not supported yet.
    ///
    /// # Errors
    ///
    /// On the leader: `Error::InvalidModelType` unless `model_type` is one of
    /// "pytorch", "sklearn", "tensorflow" or "keras" (exact case), checked
    /// before anything is written; `Error::NoActiveRun` without an active
    /// run; serialization, I/O and backend errors.
    pub async fn save_model<M: Model + ?Sized>(
        &self,
        model_type: &str,
        model: &M,
        artifact_path: &str,
        registered_model_name: Option<&str>,
    ) -> Result<()> {
        if self.context.parameter_server() {
            warn!(
                worker = self.context.worker_id(),
                "saving models under a parameter-server strategy is not supported, skipping"
            );
            return Ok(());
        }
        if !self.context.is_leader() {
            debug!(worker = self.context.worker_id(), "not the leader, skipping model save");
            return Ok(());
        }

        let model_type: ModelType = model_type.parse()?;
        let run = self.run()?;
        let bytes = model.to_bytes()?;
        let descriptor = MlModel::new(run.run_id(), artifact_path, model_type);

        let staging = tempfile::tempdir()?;
        write_tracking_layout(staging.path(), model_type, &bytes, &descriptor).await?;
        self.backend
            .log_model(run, artifact_path, staging.path(), &descriptor)
            .await?;
        info!(run_id = run.run_id(), model_type = %model_type, artifact_path, "model saved");

        if let Some(name) = registered_model_name {
            let source = format!("runs:/{}/{artifact_path}", run.run_id());
            let version = self
                .backend
                .create_model_version(name, &source, run.run_id())
                .await?;
            info!(name, version = version.version(), "model registered");
        }
        Ok(())
    }

    /// Serialize `model` into a model-server layout and upload it to the
    /// job's artifact repository under `artifact_path`.
    ///
    /// Only PyTorch and TensorFlow models are supported. The model is staged
    /// in a temporary directory that is removed on every exit path. Model
    /// registration is not supported yet: `registered_model_name` is ignored.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArtifactPath` and `Error::InvalidModelType` are
    /// returned before any I/O. Serialization, I/O and upload errors are
    /// propagated.
    pub async fn save_model_submarine<M: Model + ?Sized>(
        &self,
        model_type: &str,
        model: &M,
        artifact_path: &str,
        registered_model_name: Option<&str>,
    ) -> Result<()> {
        validate_artifact_path(artifact_path)?;
        let model_type: ModelType = model_type.parse()?;
        let relative = model_type
            .serving_file()
            .ok_or_else(|| Error::InvalidModelType(model_type.to_string()))?;
        let bytes = model.to_bytes()?;

        let staging = tempfile::tempdir()?;
        self.stage_and_upload(staging.path(), relative, &bytes, artifact_path)
            .await?;
        info!(
            job_id = self.context.job_id(),
            model_type = %model_type,
            artifact_path,
            "model uploaded"
        );

        if let Some(name) = registered_model_name {
            warn!(name, "model registration is not supported yet, model was uploaded only");
        }
        Ok(())
    }

    async fn stage_and_upload(
        &self,
        dir: &Path,
        relative: &str,
        bytes: &[u8],
        artifact_path: &str,
    ) -> Result<()> {
        write_model_file(dir, relative, bytes).await?;
        self.artifacts.log_artifacts(dir, artifact_path).await
    }
}
