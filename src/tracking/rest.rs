//! MLflow-compatible REST tracking backend.
//!
//! Talks to `{tracking_uri}/api/2.0/mlflow/...`. Timestamps travel as
//! milliseconds since the Unix epoch; model versions travel as strings.

use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::TrackingBackend;
use crate::artifacts::{ArtifactRepository, HttpArtifactRepository};
use crate::config::ClientConfig;
use crate::entities::{
    Experiment, Metric, ModelStage, ModelVersion, ModelVersionTag, Param, Run, RunStatus,
};
use crate::models::MlModel;
use crate::{http, Error, Result};

const API_PREFIX: &str = "api/2.0/mlflow";
const PROXY_SCHEME: &str = "mlflow-artifacts:";

#[derive(Debug, Deserialize)]
struct ExperimentWire {
    experiment_id: String,
    name: String,
    #[serde(default)]
    artifact_location: String,
    #[serde(default)]
    lifecycle_stage: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentWire,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunInfoWire {
    run_id: String,
    experiment_id: String,
    #[serde(default)]
    run_name: String,
    status: String,
    start_time: Option<i64>,
    end_time: Option<i64>,
    #[serde(default)]
    artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct RunWire {
    info: RunInfoWire,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    run: RunWire,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetricWire {
    key: String,
    value: f64,
    timestamp: i64,
    #[serde(default)]
    step: i64,
}

#[derive(Debug, Deserialize)]
struct MetricHistoryResponse {
    #[serde(default)]
    metrics: Vec<MetricWire>,
}

#[derive(Debug, Serialize)]
struct LogBatchRequest<'a> {
    run_id: &'a str,
    params: &'a [Param],
    metrics: Vec<MetricWire>,
}

#[derive(Debug, Deserialize)]
struct TagWire {
    key: String,
}

#[derive(Debug, Deserialize)]
struct ModelVersionWire {
    name: String,
    version: String,
    creation_timestamp: Option<i64>,
    last_updated_timestamp: Option<i64>,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    current_stage: String,
    description: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    tags: Vec<TagWire>,
}

#[derive(Debug, Deserialize)]
struct ModelVersionResponse {
    model_version: ModelVersionWire,
}

fn from_millis(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

impl From<&Metric> for MetricWire {
    fn from(metric: &Metric) -> Self {
        Self {
            key: metric.key().to_string(),
            value: metric.value(),
            timestamp: metric.timestamp().timestamp_millis(),
            step: metric.step(),
        }
    }
}

impl TryFrom<RunInfoWire> for Run {
    type Error = Error;

    fn try_from(info: RunInfoWire) -> Result<Self> {
        let mut run = Self::new(info.run_id, info.experiment_id, info.run_name, info.artifact_uri)
            .with_start_time(from_millis(info.start_time));
        let status: RunStatus = info.status.parse()?;
        if status != RunStatus::Running {
            run.set_status(status, from_millis(info.end_time));
        }
        Ok(run)
    }
}

/// Tracking backend for an MLflow-compatible tracking server.
#[derive(Debug, Clone)]
pub struct RestTrackingBackend {
    client: Client,
    base_url: String,
}

impl RestTrackingBackend {
    /// Create a backend for the tracking server in `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(
            http::build_client(config.request_timeout())?,
            config.tracking_uri(),
        ))
    }

    /// Create a backend from an existing client.
    #[must_use]
    pub fn with_client(client: Client, tracking_uri: &str) -> Self {
        Self {
            client,
            base_url: tracking_uri.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{API_PREFIX}/{route}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, route: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(route);
        debug!(method = "GET", url = %url, "tracking request");
        let response = self.client.get(&url).query(query).send().await?;
        Ok(http::check(response).await?.json().await?)
    }

    async fn send<B, T>(&self, method: Method, route: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(route);
        debug!(method = %method, url = %url, "tracking request");
        let response = self.client.request(method, &url).json(body).send().await?;
        Ok(http::check(response).await?.json().await?)
    }

    async fn post<B, T>(&self, route: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, route, body).await
    }

    async fn to_model_version(&self, wire: ModelVersionWire) -> Result<ModelVersion> {
        let version: i64 = wire.version.parse().map_err(|_| {
            Error::InvalidArgument(format!("invalid model version: {}", wire.version))
        })?;
        let stage = if wire.current_stage.is_empty() {
            ModelStage::None
        } else {
            wire.current_stage.parse()?
        };
        let experiment_id = if wire.run_id.is_empty() {
            String::new()
        } else {
            match self.get_run(&wire.run_id).await {
                Ok(run) => run.experiment_id().to_string(),
                Err(Error::NotFound(_)) => String::new(),
                Err(e) => return Err(e),
            }
        };

        let mut builder = ModelVersion::builder(wire.name, version, wire.source)
            .user_id(wire.user_id)
            .experiment_id(experiment_id)
            .current_stage(stage)
            .creation_time(from_millis(wire.creation_timestamp))
            .last_updated_time(from_millis(wire.last_updated_timestamp))
            .tags(wire.tags.into_iter().map(|t| ModelVersionTag::new(t.key)).collect());
        if let Some(description) = wire.description.filter(|d| !d.is_empty()) {
            builder = builder.description(description);
        }
        Ok(builder.build())
    }
}

impl TrackingBackend for RestTrackingBackend {
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        let response: Result<GetExperimentResponse> = self
            .get("experiments/get-by-name", &[("experiment_name", name)])
            .await;
        match response {
            Ok(found) => {
                let wire = found.experiment;
                let mut experiment =
                    Experiment::new(wire.experiment_id, wire.name, wire.artifact_location);
                if !wire.lifecycle_stage.is_empty() {
                    experiment = experiment.with_lifecycle_stage(wire.lifecycle_stage);
                }
                Ok(Some(experiment))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_experiment(&self, name: &str) -> Result<String> {
        let created: CreateExperimentResponse =
            self.post("experiments/create", &json!({ "name": name })).await?;
        Ok(created.experiment_id)
    }

    async fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<Run> {
        let body = json!({
            "experiment_id": experiment_id,
            "run_name": run_name,
            "start_time": Utc::now().timestamp_millis(),
            "tags": [{ "key": "mlflow.runName", "value": run_name }],
        });
        let created: RunResponse = self.post("runs/create", &body).await?;
        Run::try_from(created.run.info)
    }

    async fn get_run(&self, run_id: &str) -> Result<Run> {
        let found: RunResponse = self.get("runs/get", &[("run_id", run_id)]).await?;
        Run::try_from(found.run.info)
    }

    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let mut body = json!({ "run_id": run_id, "status": status.as_str() });
        if status.is_terminal() {
            body["end_time"] = json!(Utc::now().timestamp_millis());
        }
        let _: IgnoredAny = self.post("runs/update", &body).await?;
        Ok(())
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let body = json!({ "run_id": run_id, "key": key, "value": value });
        let _: IgnoredAny = self.post("runs/log-parameter", &body).await?;
        Ok(())
    }

    async fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()> {
        let wire = MetricWire::from(metric);
        let body = json!({
            "run_id": run_id,
            "key": wire.key,
            "value": wire.value,
            "timestamp": wire.timestamp,
            "step": wire.step,
        });
        let _: IgnoredAny = self.post("runs/log-metric", &body).await?;
        Ok(())
    }

    async fn log_batch(&self, run_id: &str, params: &[Param], metrics: &[Metric]) -> Result<()> {
        let body = LogBatchRequest {
            run_id,
            params,
            metrics: metrics.iter().map(MetricWire::from).collect(),
        };
        let _: IgnoredAny = self.post("runs/log-batch", &body).await?;
        Ok(())
    }

    async fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<Metric>> {
        let run = self.get_run(run_id).await?;
        let history: MetricHistoryResponse = self
            .get("metrics/get-history", &[("run_id", run_id), ("metric_key", key)])
            .await?;
        let mut metrics: Vec<Metric> = history
            .metrics
            .into_iter()
            .map(|m| {
                let timestamp = from_millis(Some(m.timestamp));
                Metric::new(m.key, m.value, run.run_name(), timestamp, m.step)
            })
            .collect();
        metrics.sort_by_key(|m| (m.step(), m.timestamp()));
        Ok(metrics)
    }

    async fn log_model(
        &self,
        run: &Run,
        artifact_path: &str,
        local_dir: &Path,
        model: &MlModel,
    ) -> Result<()> {
        let scope = run.artifact_uri().strip_prefix(PROXY_SCHEME).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "run artifact uri {} is not served by the tracking server",
                run.artifact_uri()
            ))
        })?;
        let repo = HttpArtifactRepository::with_client(self.client.clone(), &self.base_url, scope);
        repo.log_artifacts(local_dir, artifact_path).await?;

        let body = json!({
            "run_id": run.run_id(),
            "model_json": serde_json::to_string(model)?,
        });
        let _: IgnoredAny = self.post("runs/log-model", &body).await?;
        info!(run_id = run.run_id(), artifact_path, "model logged");
        Ok(())
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let registered: Result<IgnoredAny> = self
            .post("registered-models/create", &json!({ "name": name }))
            .await;
        match registered {
            Ok(_) | Err(Error::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        let body = json!({ "name": name, "source": source, "run_id": run_id });
        let created: ModelVersionResponse = self.post("model-versions/create", &body).await?;
        self.to_model_version(created.model_version).await
    }

    async fn get_model_version(&self, name: &str, version: i64) -> Result<ModelVersion> {
        let version = version.to_string();
        let found: ModelVersionResponse = self
            .get("model-versions/get", &[("name", name), ("version", version.as_str())])
            .await?;
        self.to_model_version(found.model_version).await
    }

    async fn rename_registered_model(&self, name: &str, new_name: &str) -> Result<()> {
        let body = json!({ "name": name, "new_name": new_name });
        let _: IgnoredAny = self.post("registered-models/rename", &body).await?;
        Ok(())
    }

    async fn delete_model_version(&self, name: &str, version: i64) -> Result<()> {
        let body = json!({ "name": name, "version": version.to_string() });
        let _: IgnoredAny = self
            .send(Method::DELETE, "model-versions/delete", &body)
            .await?;
        Ok(())
    }

    async fn transition_model_version_stage(
        &self,
        name: &str,
        version: i64,
        stage: ModelStage,
    ) -> Result<ModelVersion> {
        let body = json!({
            "name": name,
            "version": version.to_string(),
            "stage": stage.as_str(),
            "archive_existing_versions": false,
        });
        let updated: ModelVersionResponse =
            self.post("model-versions/transition-stage", &body).await?;
        self.to_model_version(updated.model_version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_from_wire() {
        let info = RunInfoWire {
            run_id: "abc".into(),
            experiment_id: "1".into(),
            run_name: "worker-0".into(),
            status: "FINISHED".into(),
            start_time: Some(1_700_000_000_000),
            end_time: Some(1_700_000_060_000),
            artifact_uri: "mlflow-artifacts:/1/abc/artifacts".into(),
        };
        let run = Run::try_from(info).unwrap();
        assert_eq!(run.status(), RunStatus::Finished);
        assert_eq!(run.start_time().timestamp(), 1_700_000_000);
        assert_eq!(run.end_time().unwrap().timestamp(), 1_700_000_060);
    }

    #[test]
    fn test_metric_wire_millis() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let wire = MetricWire::from(&Metric::new("loss", 0.25, "worker-0", at, 7));
        assert_eq!(wire.timestamp, 1_700_000_000_123);
        assert_eq!(wire.step, 7);
    }

    #[test]
    fn test_url() {
        let backend = RestTrackingBackend::with_client(Client::new(), "http://mlflow:5000/");
        assert_eq!(
            backend.url("runs/create"),
            "http://mlflow:5000/api/2.0/mlflow/runs/create"
        );
    }
}
