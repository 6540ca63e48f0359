//! Experiment tracking backends
//!
//! The models client never talks to a tracking server directly; it goes
//! through a `TrackingBackend`. Two backends ship with the crate:
//!
//! - [`RestTrackingBackend`]: MLflow-compatible tracking server over HTTP
//! - [`MemoryTrackingBackend`]: in-process store for local runs and tests
//!
//! # Example
//!
//! ```rust
//! use submarine_models::tracking::{MemoryTrackingBackend, TrackingBackend};
//!
//! # async fn example() -> submarine_models::Result<()> {
//! let backend = MemoryTrackingBackend::new();
//!
//! let experiment_id = backend.create_experiment("job-1").await?;
//! let run = backend.create_run(&experiment_id, "worker-0").await?;
//! backend.log_param(run.run_id(), "batch_size", "64").await?;
//!
//! let found = backend.get_experiment_by_name("job-1").await?;
//! assert_eq!(found.map(|e| e.experiment_id().to_string()), Some(experiment_id));
//! # Ok(())
//! # }
//! ```

mod memory;
mod rest;

pub use memory::{LoggedModel, MemoryTrackingBackend};
pub use rest::RestTrackingBackend;

use std::future::Future;
use std::path::Path;

use crate::entities::{Experiment, Metric, ModelStage, ModelVersion, Param, Run, RunStatus};
use crate::models::MlModel;
use crate::Result;

/// Experiment tracking and model registry operations.
///
/// Implementations report missing resources as `Error::NotFound` and
/// duplicates as `Error::AlreadyExists`; every other failure is passed
/// through unchanged.
pub trait TrackingBackend: Send + Sync {
    /// Look up an experiment by name.
    ///
    /// Returns `None` if no experiment has that name.
    fn get_experiment_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Experiment>>> + Send;

    /// Create an experiment and return its id.
    fn create_experiment(&self, name: &str) -> impl Future<Output = Result<String>> + Send;

    /// Start a run named `run_name` under an experiment.
    fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> impl Future<Output = Result<Run>> + Send;

    /// Fetch a run.
    fn get_run(&self, run_id: &str) -> impl Future<Output = Result<Run>> + Send;

    /// Set a run's status. Terminal statuses also stamp the end time.
    fn update_run(&self, run_id: &str, status: RunStatus)
        -> impl Future<Output = Result<()>> + Send;

    /// Log one parameter.
    fn log_param(
        &self,
        run_id: &str,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Log one metric data point.
    fn log_metric(&self, run_id: &str, metric: &Metric) -> impl Future<Output = Result<()>> + Send;

    /// Log parameters and metrics in one call.
    fn log_batch(
        &self,
        run_id: &str,
        params: &[Param],
        metrics: &[Metric],
    ) -> impl Future<Output = Result<()>> + Send;

    /// All values logged for `key` in a run, ordered by step then timestamp.
    fn get_metric_history(
        &self,
        run_id: &str,
        key: &str,
    ) -> impl Future<Output = Result<Vec<Metric>>> + Send;

    /// Store a serialized model directory as run artifacts under
    /// `artifact_path` and record its `MLmodel` descriptor on the run.
    fn log_model(
        &self,
        run: &Run,
        artifact_path: &str,
        local_dir: &Path,
        model: &MlModel,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Register a new version of `name` (creating the registered model if
    /// needed) pointing at `source`.
    fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<ModelVersion>> + Send;

    /// Fetch one model version.
    fn get_model_version(
        &self,
        name: &str,
        version: i64,
    ) -> impl Future<Output = Result<ModelVersion>> + Send;

    /// Rename a registered model and all its versions.
    fn rename_registered_model(
        &self,
        name: &str,
        new_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete one model version.
    fn delete_model_version(
        &self,
        name: &str,
        version: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Move a model version to another lifecycle stage.
    fn transition_model_version_stage(
        &self,
        name: &str,
        version: i64,
        stage: ModelStage,
    ) -> impl Future<Output = Result<ModelVersion>> + Send;
}
