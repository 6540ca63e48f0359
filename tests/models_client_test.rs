//! Models client tests against the in-memory backend and a local artifact
//! repository.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use submarine_models::artifacts::{ArtifactRepository, LocalArtifactRepository};
use submarine_models::entities::{ModelStage, RunStatus};
use submarine_models::models::MLMODEL_FILE;
use submarine_models::tracking::{MemoryTrackingBackend, TrackingBackend};
use submarine_models::{ClientConfig, Error, JobContext, ModelType, ModelsClient, WorkerRole};

type TestClient = ModelsClient<MemoryTrackingBackend, LocalArtifactRepository>;

fn client(root: &Path, backend: &MemoryTrackingBackend, context: JobContext) -> TestClient {
    let artifacts = LocalArtifactRepository::new(root, context.job_id());
    ModelsClient::new(ClientConfig::default(), context, backend.clone(), artifacts)
}

fn leader(root: &Path, backend: &MemoryTrackingBackend) -> TestClient {
    client(root, backend, JobContext::new("job-1", "worker-0", WorkerRole::Leader))
}

/// Repository whose uploads always fail, remembering what it was handed.
#[derive(Debug, Default)]
struct FailingArtifactRepository {
    uploaded_from: Mutex<Option<PathBuf>>,
}

impl ArtifactRepository for FailingArtifactRepository {
    async fn log_artifacts(
        &self,
        local_dir: &Path,
        _artifact_path: &str,
    ) -> submarine_models::Result<()> {
        assert!(local_dir.join("1/model.pt").is_file());
        *self.uploaded_from.lock().unwrap() = Some(local_dir.to_path_buf());
        Err(Error::Io(std::io::Error::other("artifact store unreachable")))
    }
}

// =============================================================================
// Runs, params and metrics
// =============================================================================

#[tokio::test]
async fn test_start_creates_experiment_and_run() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);

    let run = client.start().await.unwrap().clone();
    assert_eq!(run.run_name(), "worker-0");
    assert_eq!(run.status(), RunStatus::Running);

    let experiment = backend.get_experiment_by_name("job-1").await.unwrap().unwrap();
    assert_eq!(run.experiment_id(), experiment.experiment_id());
    assert_eq!(backend.experiment_count(), 1);
    assert_eq!(backend.run_count(), 1);
    assert_eq!(client.active_run().map(|r| r.run_id()), Some(run.run_id()));
}

#[tokio::test]
async fn test_run_scoped_calls_require_start() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);

    let err = client.log_param("lr", "0.1").await.unwrap_err();
    assert!(matches!(err, Error::NoActiveRun));
    let err = client.log_metric("loss", 0.5, None).await.unwrap_err();
    assert!(matches!(err, Error::NoActiveRun));
    let err = client.end_run(RunStatus::Finished).await.unwrap_err();
    assert!(matches!(err, Error::NoActiveRun));
    assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn test_params_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);
    let run_id = client.start().await.unwrap().run_id().to_string();

    client.log_param("optimizer", "adam").await.unwrap();
    client
        .log_params([("batch_size", "64"), ("epochs", "3")])
        .await
        .unwrap();
    client.log_metric("loss", 0.9, None).await.unwrap();
    client.log_metric("loss", 0.4, Some(2)).await.unwrap();
    client
        .log_metrics([("loss", 0.6), ("accuracy", 0.7)], Some(1))
        .await
        .unwrap();

    let params = backend.params(&run_id);
    assert_eq!(params.len(), 3);
    assert_eq!(params.get("batch_size").map(String::as_str), Some("64"));

    let history = client.metric_history("loss").await.unwrap();
    let steps: Vec<i64> = history.iter().map(|m| m.step()).collect();
    assert_eq!(steps, [0, 1, 2]);
    assert!(history.iter().all(|m| m.worker_index() == "worker-0"));
    assert_eq!(client.metric_history("accuracy").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_end_run() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);
    let run_id = client.start().await.unwrap().run_id().to_string();

    client.end_run(RunStatus::Finished).await.unwrap();
    assert!(client.active_run().is_none());

    let run = backend.get_run(&run_id).await.unwrap();
    assert_eq!(run.status(), RunStatus::Finished);
    assert!(run.end_time().is_some());
}

// =============================================================================
// save_model
// =============================================================================

#[tokio::test]
async fn test_save_model_every_framework() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);
    let run_id = client.start().await.unwrap().run_id().to_string();

    for model_type in ModelType::ALL {
        let artifact_path = format!("model-{model_type}");
        client
            .save_model(model_type.as_str(), b"weights".as_slice(), &artifact_path, Some("mnist"))
            .await
            .unwrap();
    }

    let logged = backend.logged_models(&run_id);
    assert_eq!(logged.len(), ModelType::ALL.len());
    for (model, model_type) in logged.iter().zip(ModelType::ALL) {
        assert_eq!(model.descriptor.model_type(), Some(model_type));
        assert_eq!(model.descriptor.run_id, run_id);
        assert!(model.files.iter().any(|f| f == MLMODEL_FILE));
        assert!(model.files.iter().any(|f| f == model_type.tracking_file()));
    }

    let loaded = client.load_model("mnist", 4).await.unwrap();
    assert_eq!(loaded.model_uri(), "models:/mnist/4");
    assert_eq!(loaded.source(), format!("runs:/{run_id}/model-keras"));
}

#[tokio::test]
async fn test_save_model_without_registration() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);
    let run_id = client.start().await.unwrap().run_id().to_string();

    client
        .save_model("sklearn", b"pickle".as_slice(), "model", None)
        .await
        .unwrap();

    assert_eq!(backend.logged_models(&run_id).len(), 1);
    let err = client.load_model("model", 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_save_model_rejects_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);
    client.start().await.unwrap();
    let mutations = backend.mutations();

    for model_type in ["PyTorch", "xgboost", ""] {
        let err = client
            .save_model(model_type, b"weights".as_slice(), "model", Some("mnist"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModelType(ref t) if t == model_type));
    }
    assert_eq!(backend.mutations(), mutations);
}

#[tokio::test]
async fn test_save_model_requires_run_on_leader() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let client = leader(dir.path(), &backend);

    let err = client
        .save_model("pytorch", b"weights".as_slice(), "model", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoActiveRun));
}

#[tokio::test]
async fn test_parameter_server_skips_save() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();

    for index in 0..4 {
        let worker_id = format!("worker-{index}");
        let context = JobContext::new("job-ps", &worker_id, WorkerRole::from_worker_id(&worker_id))
            .with_parameter_server(true);
        let client = client(dir.path(), &backend, context);

        client
            .save_model("tensorflow", b"graph".as_slice(), "model", Some("ps-model"))
            .await
            .unwrap();
    }
    assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn test_follower_skips_save() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    backend.create_experiment("job-1").await.unwrap();

    let context = JobContext::new("job-1", "worker-2", WorkerRole::Follower);
    let mut client = client(dir.path(), &backend, context);
    let run_id = client.start().await.unwrap().run_id().to_string();
    let mutations = backend.mutations();

    client
        .save_model("pytorch", b"weights".as_slice(), "model", Some("mnist"))
        .await
        .unwrap();

    assert_eq!(backend.mutations(), mutations);
    assert!(backend.logged_models(&run_id).is_empty());
}

// =============================================================================
// save_model_submarine
// =============================================================================

#[tokio::test]
async fn test_save_model_submarine_serving_layouts() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let client = leader(dir.path(), &backend);

    client
        .save_model_submarine("pytorch", b"torchscript".as_slice(), "mnist-pt", None)
        .await
        .unwrap();
    client
        .save_model_submarine("tensorflow", b"savedmodel".as_slice(), "mnist_tf", Some("mnist"))
        .await
        .unwrap();

    let artifacts = client.artifacts();
    assert_eq!(artifacts.list_artifacts("mnist-pt").unwrap(), ["1/model.pt"]);
    assert_eq!(
        artifacts.list_artifacts("mnist_tf").unwrap(),
        ["1/model.savedmodel/saved_model.pb"]
    );
    let stored = std::fs::read(artifacts.base().join("mnist-pt/1/model.pt")).unwrap();
    assert_eq!(stored, b"torchscript");

    // Uploads go to the artifact store only.
    assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn test_save_model_submarine_validates_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let client = leader(dir.path(), &backend);

    for path in ["", "-model", "model_", "a/b", "model.pt", "../escape"] {
        let err = client
            .save_model_submarine("pytorch", b"weights".as_slice(), path, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArtifactPath(ref p) if p == path));
    }
    for model_type in ["sklearn", "keras", "onnx"] {
        let err = client
            .save_model_submarine(model_type, b"weights".as_slice(), "model", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModelType(ref t) if t == model_type));
    }

    assert!(!client.artifacts().base().exists());
}

#[tokio::test]
async fn test_save_model_submarine_cleans_staging_after_failed_upload() {
    let backend = MemoryTrackingBackend::new();
    let context = JobContext::new("job-1", "worker-0", WorkerRole::Leader);
    let client = ModelsClient::new(
        ClientConfig::default(),
        context,
        backend.clone(),
        FailingArtifactRepository::default(),
    );

    let err = client
        .save_model_submarine("pytorch", b"torchscript".as_slice(), "mnist", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(ref e) if e.to_string() == "artifact store unreachable"));

    let staged = client.artifacts().uploaded_from.lock().unwrap().clone().unwrap();
    assert!(!staged.exists());
    assert_eq!(backend.mutations(), 0);
}

// =============================================================================
// Model registry
// =============================================================================

#[tokio::test]
async fn test_registry_operations() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryTrackingBackend::new();
    let mut client = leader(dir.path(), &backend);
    client.start().await.unwrap();

    for _ in 0..2 {
        client
            .save_model("pytorch", b"weights".as_slice(), "model", Some("mnist"))
            .await
            .unwrap();
    }

    let staged = client
        .transition_model_stage("mnist", 2, ModelStage::Production)
        .await
        .unwrap();
    assert_eq!(staged.current_stage(), ModelStage::Production);

    client.update_model("mnist", "mnist-cnn").await.unwrap();
    let err = client.load_model("mnist", 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let renamed = client.load_model("mnist-cnn", 2).await.unwrap();
    assert_eq!(renamed.model_version().name(), "mnist-cnn");
    assert_eq!(renamed.model_version().current_stage(), ModelStage::Production);

    client.delete_model("mnist-cnn", 1).await.unwrap();
    let err = client.load_model("mnist-cnn", 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let err = client.delete_model("mnist-cnn", 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
