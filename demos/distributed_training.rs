//! Distributed Training Example
//!
//! Simulates a four-worker training job sharing one tracking server. The
//! leader creates the job's experiment and saves the model; the followers
//! wait for the experiment, then log their own metrics.
//!
//! Run with: cargo run --example distributed_training

use std::time::Duration;

use submarine_models::artifacts::LocalArtifactRepository;
use submarine_models::entities::{ModelStage, RunStatus};
use submarine_models::logging::init_tracing;
use submarine_models::tracking::MemoryTrackingBackend;
use submarine_models::{get_optimizer, ClientConfig, JobContext, ModelsClient, WorkerRole};

const JOB_ID: &str = "mnist-job-001";
const WORKERS: u32 = 4;
const EPOCHS: u32 = 5;

async fn train(
    worker_index: u32,
    backend: MemoryTrackingBackend,
    artifact_root: std::path::PathBuf,
) -> anyhow::Result<()> {
    let worker_id = format!("worker-{worker_index}");
    let context = JobContext::new(JOB_ID, &worker_id, WorkerRole::from_worker_id(&worker_id));
    let artifacts = LocalArtifactRepository::new(&artifact_root, JOB_ID);
    let mut client = ModelsClient::new(ClientConfig::default(), context, backend, artifacts);

    // Followers start first and have to wait for the leader.
    if client.context().is_leader() {
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }
    let run_id = client.start().await?.run_id().to_string();
    println!("   {worker_id}: run {run_id}");

    let optimizer = get_optimizer("Adam")?.with_learning_rate(0.01);
    client.log_params(optimizer.params()).await?;

    for epoch in 0..EPOCHS {
        let step = f64::from(epoch);
        let loss = 2.0 / (step + 1.0) + 0.05 * f64::from(worker_index);
        let accuracy = 0.6 + 0.07 * step;
        client
            .log_metrics([("loss", loss), ("accuracy", accuracy)], Some(i64::from(epoch)))
            .await?;
    }

    let model = serde_json::json!({ "layers": [784, 128, 10], "worker": worker_id });
    client
        .save_model("pytorch", &model, "mnist-cnn", Some("mnist"))
        .await?;
    if client.context().is_leader() {
        client
            .save_model_submarine("pytorch", &model, "mnist-cnn", None)
            .await?;
    }

    client.end_run(RunStatus::Finished).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("submarine_models=info");
    println!("=== Submarine Models: Distributed Training ===\n");

    let backend = MemoryTrackingBackend::new();
    let artifact_root = tempfile::tempdir()?;

    // -------------------------------------------------------------------------
    // 1. Run every worker of the job concurrently
    // -------------------------------------------------------------------------
    println!("1. Starting {WORKERS} workers for job {JOB_ID}...");

    let mut workers = Vec::new();
    for index in 0..WORKERS {
        workers.push(tokio::spawn(train(
            index,
            backend.clone(),
            artifact_root.path().to_path_buf(),
        )));
    }
    for worker in workers {
        worker.await??;
    }

    // -------------------------------------------------------------------------
    // 2. Inspect what the tracking server recorded
    // -------------------------------------------------------------------------
    println!("\n2. Tracking summary");
    println!("   Experiments: {}", backend.experiment_count());
    println!("   Runs: {}", backend.run_count());

    // -------------------------------------------------------------------------
    // 3. Promote the registered model
    // -------------------------------------------------------------------------
    println!("\n3. Model registry");
    let context = JobContext::new(JOB_ID, "worker-0", WorkerRole::Leader);
    let artifacts = LocalArtifactRepository::new(artifact_root.path(), JOB_ID);
    let admin = ModelsClient::new(ClientConfig::default(), context, backend.clone(), artifacts);

    let promoted = admin
        .transition_model_stage("mnist", 1, ModelStage::Production)
        .await?;
    let loaded = admin.load_model("mnist", promoted.version()).await?;
    println!("   {} -> {} ({})", loaded.model_uri(), loaded.source(), promoted.current_stage());

    // -------------------------------------------------------------------------
    // 4. Serving layout in the job's artifact repository
    // -------------------------------------------------------------------------
    println!("\n4. Serving artifacts");
    for file in admin.artifacts().list_artifacts("mnist-cnn")? {
        println!("   {JOB_ID}/mnist-cnn/{file}");
    }

    println!("\n=== Done ===");
    Ok(())
}
