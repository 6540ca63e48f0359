//! In-memory tracking backend using `DashMap`.
//!
//! State lives only as long as the backend; clones share it, so one
//! backend can stand in for a tracking server shared by several workers.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use super::TrackingBackend;
use crate::artifacts::walk_files;
use crate::entities::{Experiment, Metric, ModelStage, ModelVersion, Param, Run, RunStatus};
use crate::models::MlModel;
use crate::{Error, Result};

/// A model logged to a run of the in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedModel {
    /// Artifact path the model was logged under.
    pub artifact_path: String,
    /// The model's descriptor.
    pub descriptor: MlModel,
    /// Relative paths of the files that were logged.
    pub files: Vec<String>,
}

#[derive(Debug)]
struct RunEntry {
    run: Run,
    params: FxHashMap<String, String>,
    metrics: Vec<Metric>,
    models: Vec<LoggedModel>,
}

#[derive(Debug, Default)]
struct RegisteredModel {
    versions: BTreeMap<i64, ModelVersion>,
    last_version: i64,
}

#[derive(Debug, Default)]
struct Inner {
    experiments: DashMap<String, Experiment>,
    runs: DashMap<String, RunEntry>,
    models: DashMap<String, RegisteredModel>,
    last_experiment_id: AtomicU64,
    experiment_lookups: AtomicUsize,
    mutations: AtomicUsize,
}

/// Tracking backend that keeps everything in process memory.
///
/// # Example
///
/// ```rust
/// use submarine_models::tracking::{MemoryTrackingBackend, TrackingBackend};
///
/// # async fn example() -> submarine_models::Result<()> {
/// let backend = MemoryTrackingBackend::new();
/// let leader_view = backend.clone();
///
/// leader_view.create_experiment("job-1").await?;
/// assert!(backend.get_experiment_by_name("job-1").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTrackingBackend {
    inner: Arc<Inner>,
}

impl MemoryTrackingBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.inner.experiments.len()
    }

    /// Number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.inner.runs.len()
    }

    /// Number of `get_experiment_by_name` calls served so far.
    #[must_use]
    pub fn experiment_lookups(&self) -> usize {
        self.inner.experiment_lookups.load(Ordering::SeqCst)
    }

    /// Number of successful state-changing calls served so far.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.inner.mutations.load(Ordering::SeqCst)
    }

    /// Parameters logged to a run.
    #[must_use]
    pub fn params(&self, run_id: &str) -> FxHashMap<String, String> {
        self.inner
            .runs
            .get(run_id)
            .map(|entry| entry.params.clone())
            .unwrap_or_default()
    }

    /// Models logged to a run, in logging order.
    #[must_use]
    pub fn logged_models(&self, run_id: &str) -> Vec<LoggedModel> {
        self.inner
            .runs
            .get(run_id)
            .map(|entry| entry.models.clone())
            .unwrap_or_default()
    }

    fn mutated(&self) {
        self.inner.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn with_run<T>(&self, run_id: &str, f: impl FnOnce(&mut RunEntry) -> T) -> Result<T> {
        let mut entry = self
            .inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::NotFound(format!("Run '{run_id}' not found")))?;
        let out = f(&mut entry);
        drop(entry);
        self.mutated();
        Ok(out)
    }
}

fn model_not_found(name: &str) -> Error {
    Error::NotFound(format!("Registered Model with name={name} not found"))
}

fn version_not_found(name: &str, version: i64) -> Error {
    Error::NotFound(format!(
        "Model Version (name={name}, version={version}) not found"
    ))
}

impl TrackingBackend for MemoryTrackingBackend {
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        self.inner.experiment_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.experiments.get(name).map(|e| e.value().clone()))
    }

    async fn create_experiment(&self, name: &str) -> Result<String> {
        match self.inner.experiments.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!(
                "Experiment '{name}' already exists."
            ))),
            Entry::Vacant(slot) => {
                let id = (self.inner.last_experiment_id.fetch_add(1, Ordering::SeqCst) + 1)
                    .to_string();
                slot.insert(Experiment::new(&id, name, format!("memory:/{id}")));
                self.mutated();
                Ok(id)
            }
        }
    }

    async fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<Run> {
        let experiment_exists = self
            .inner
            .experiments
            .iter()
            .any(|e| e.experiment_id() == experiment_id);
        if !experiment_exists {
            return Err(Error::NotFound(format!(
                "No Experiment with id={experiment_id} exists"
            )));
        }

        let run_id = Uuid::new_v4().simple().to_string();
        let run = Run::new(
            &run_id,
            experiment_id,
            run_name,
            format!("memory:/{experiment_id}/{run_id}/artifacts"),
        );
        self.inner.runs.insert(
            run_id,
            RunEntry {
                run: run.clone(),
                params: FxHashMap::default(),
                metrics: Vec::new(),
                models: Vec::new(),
            },
        );
        self.mutated();
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<Run> {
        self.inner
            .runs
            .get(run_id)
            .map(|entry| entry.run.clone())
            .ok_or_else(|| Error::NotFound(format!("Run '{run_id}' not found")))
    }

    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.with_run(run_id, |entry| entry.run.set_status(status, Utc::now()))
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.with_run(run_id, |entry| {
            entry.params.insert(key.to_string(), value.to_string());
        })
    }

    async fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()> {
        self.with_run(run_id, |entry| entry.metrics.push(metric.clone()))
    }

    async fn log_batch(&self, run_id: &str, params: &[Param], metrics: &[Metric]) -> Result<()> {
        self.with_run(run_id, |entry| {
            for param in params {
                entry.params.insert(param.key.clone(), param.value.clone());
            }
            entry.metrics.extend_from_slice(metrics);
        })
    }

    async fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<Metric>> {
        let entry = self
            .inner
            .runs
            .get(run_id)
            .ok_or_else(|| Error::NotFound(format!("Run '{run_id}' not found")))?;
        let mut history: Vec<Metric> = entry
            .metrics
            .iter()
            .filter(|m| m.key() == key)
            .cloned()
            .collect();
        history.sort_by_key(|m| (m.step(), m.timestamp()));
        Ok(history)
    }

    async fn log_model(
        &self,
        run: &Run,
        artifact_path: &str,
        local_dir: &Path,
        model: &MlModel,
    ) -> Result<()> {
        let files = walk_files(local_dir)
            .await?
            .into_iter()
            .map(|f| f.relative)
            .collect();
        let logged = LoggedModel {
            artifact_path: artifact_path.to_string(),
            descriptor: model.clone(),
            files,
        };
        self.with_run(run.run_id(), |entry| entry.models.push(logged))
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let experiment_id = self
            .inner
            .runs
            .get(run_id)
            .map(|entry| entry.run.experiment_id().to_string())
            .unwrap_or_default();

        let mut model = self.inner.models.entry(name.to_string()).or_default();
        model.last_version += 1;
        let version = ModelVersion::builder(name, model.last_version, source)
            .experiment_id(experiment_id)
            .build();
        model.versions.insert(version.version(), version.clone());
        drop(model);
        self.mutated();
        Ok(version)
    }

    async fn get_model_version(&self, name: &str, version: i64) -> Result<ModelVersion> {
        self.inner
            .models
            .get(name)
            .and_then(|model| model.versions.get(&version).cloned())
            .ok_or_else(|| version_not_found(name, version))
    }

    async fn rename_registered_model(&self, name: &str, new_name: &str) -> Result<()> {
        let (_, mut model) = self
            .inner
            .models
            .remove(name)
            .ok_or_else(|| model_not_found(name))?;

        // The new-name entry guard must be released before `name` is restored.
        let conflict = match self.inner.models.entry(new_name.to_string()) {
            Entry::Vacant(slot) => {
                let now = Utc::now();
                model.versions = std::mem::take(&mut model.versions)
                    .into_iter()
                    .map(|(number, version)| (number, version.renamed(new_name, now)))
                    .collect();
                slot.insert(model);
                None
            }
            Entry::Occupied(_) => Some(model),
        };
        if let Some(model) = conflict {
            self.inner.models.entry(name.to_string()).or_insert(model);
            return Err(Error::AlreadyExists(format!(
                "Registered Model (name={new_name}) already exists."
            )));
        }
        self.mutated();
        Ok(())
    }

    async fn delete_model_version(&self, name: &str, version: i64) -> Result<()> {
        let mut model = self
            .inner
            .models
            .get_mut(name)
            .ok_or_else(|| model_not_found(name))?;
        model
            .versions
            .remove(&version)
            .ok_or_else(|| version_not_found(name, version))?;
        drop(model);
        self.mutated();
        Ok(())
    }

    async fn transition_model_version_stage(
        &self,
        name: &str,
        version: i64,
        stage: ModelStage,
    ) -> Result<ModelVersion> {
        let mut model = self
            .inner
            .models
            .get_mut(name)
            .ok_or_else(|| model_not_found(name))?;
        let slot = model
            .versions
            .get_mut(&version)
            .ok_or_else(|| version_not_found(name, version))?;
        *slot = slot.clone().staged(stage, Utc::now());
        let updated = slot.clone();
        drop(model);
        self.mutated();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_experiment_lifecycle() {
        let backend = MemoryTrackingBackend::new();
        assert!(backend.get_experiment_by_name("job").await.unwrap().is_none());

        let id = backend.create_experiment("job").await.unwrap();
        assert_eq!(id, "1");
        let err = backend.create_experiment("job").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        assert_eq!(backend.experiment_lookups(), 1);
        assert_eq!(backend.mutations(), 1);
    }

    #[tokio::test]
    async fn test_run_requires_experiment() {
        let backend = MemoryTrackingBackend::new();
        let err = backend.create_run("42", "worker-0").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_params_and_metric_history() {
        let backend = MemoryTrackingBackend::new();
        let exp = backend.create_experiment("job").await.unwrap();
        let run = backend.create_run(&exp, "worker-1").await.unwrap();

        let now = Utc::now();
        backend.log_param(run.run_id(), "lr", "0.1").await.unwrap();
        backend
            .log_batch(
                run.run_id(),
                &[Param::new("epochs", "3")],
                &[
                    Metric::new("loss", 0.2, "worker-1", now, 2),
                    Metric::new("acc", 0.9, "worker-1", now, 2),
                ],
            )
            .await
            .unwrap();
        backend
            .log_metric(run.run_id(), &Metric::new("loss", 0.5, "worker-1", now, 0))
            .await
            .unwrap();

        let params = backend.params(run.run_id());
        assert_eq!(params.get("lr").map(String::as_str), Some("0.1"));
        assert_eq!(params.get("epochs").map(String::as_str), Some("3"));

        let steps: Vec<_> = backend
            .get_metric_history(run.run_id(), "loss")
            .await
            .unwrap()
            .iter()
            .map(Metric::step)
            .collect();
        assert_eq!(steps, [0, 2]);
    }

    #[tokio::test]
    async fn test_update_run_terminal() {
        let backend = MemoryTrackingBackend::new();
        let exp = backend.create_experiment("job").await.unwrap();
        let run = backend.create_run(&exp, "worker-0").await.unwrap();
        backend.update_run(run.run_id(), RunStatus::Failed).await.unwrap();

        let stored = backend.get_run(run.run_id()).await.unwrap();
        assert_eq!(stored.status(), RunStatus::Failed);
        assert!(stored.end_time().is_some());
    }

    #[tokio::test]
    async fn test_registry_versions() {
        let backend = MemoryTrackingBackend::new();
        let v1 = backend.create_model_version("mnist", "runs:/a/model", "a").await.unwrap();
        let v2 = backend.create_model_version("mnist", "runs:/b/model", "b").await.unwrap();
        assert_eq!((v1.version(), v2.version()), (1, 2));

        let staged = backend
            .transition_model_version_stage("mnist", 2, ModelStage::Production)
            .await
            .unwrap();
        assert_eq!(staged.current_stage(), ModelStage::Production);

        backend.delete_model_version("mnist", 1).await.unwrap();
        assert!(matches!(
            backend.get_model_version("mnist", 1).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            backend.delete_model_version("mnist", 1).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_rename_registered_model() {
        let backend = MemoryTrackingBackend::new();
        backend.create_model_version("old", "src", "").await.unwrap();
        backend.rename_registered_model("old", "new").await.unwrap();

        let version = backend.get_model_version("new", 1).await.unwrap();
        assert_eq!(version.name(), "new");
        assert!(backend.get_model_version("old", 1).await.is_err());
        assert!(matches!(
            backend.rename_registered_model("old", "newer").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_model_keeps_both() {
        let backend = MemoryTrackingBackend::new();
        backend.create_model_version("mnist", "runs:/a/model", "a").await.unwrap();
        backend.create_model_version("resnet", "runs:/b/model", "b").await.unwrap();

        let err = backend.rename_registered_model("mnist", "resnet").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let kept = backend.get_model_version("mnist", 1).await.unwrap();
        assert_eq!((kept.name(), kept.source()), ("mnist", "runs:/a/model"));
        let other = backend.get_model_version("resnet", 1).await.unwrap();
        assert_eq!(other.source(), "runs:/b/model");
    }

    #[tokio::test]
    async fn test_concurrent_renames_to_one_name() {
        let backend = MemoryTrackingBackend::new();
        for name in ["a", "b", "c", "d"] {
            backend.create_model_version(name, "src", "").await.unwrap();
        }

        let mut tasks = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let backend = backend.clone();
            tasks.push(tokio::spawn(async move {
                backend.rename_registered_model(name, "target").await
            }));
        }
        let mut renamed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => renamed += 1,
                Err(err) => assert!(matches!(err, Error::AlreadyExists(_))),
            }
        }

        assert_eq!(renamed, 1);
        assert_eq!(backend.get_model_version("target", 1).await.unwrap().name(), "target");
        let mut remaining = 0;
        for name in ["a", "b", "c", "d"] {
            if backend.get_model_version(name, 1).await.is_ok() {
                remaining += 1;
            }
        }
        assert_eq!(remaining, 3);
    }
}
