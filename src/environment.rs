//! Job and worker identity
//!
//! A distributed training job runs one process per worker. Each process
//! needs to know the job it belongs to (which names the experiment), its
//! own worker id (which names its run), whether it is the leader, and
//! whether the job uses a parameter-server strategy.
//!
//! The orchestrator communicates this through environment variables:
//!
//! - `TF_CONFIG`: TensorFlow cluster spec, `{"cluster": {...}, "task": {"type": "worker", "index": 1}}`
//! - `RANK`: PyTorch distributed rank
//! - `JOB_ID`: job identifier
//!
//! Without any of them the process is treated as local single-worker training.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::Result;

/// TensorFlow cluster spec variable.
pub const TF_CONFIG_ENV: &str = "TF_CONFIG";
/// PyTorch distributed rank variable.
pub const RANK_ENV: &str = "RANK";
/// Job identifier variable.
pub const JOB_ID_ENV: &str = "JOB_ID";

/// Worker id of the conventional leader.
pub const LEADER_WORKER_ID: &str = "worker-0";

/// Whether this worker coordinates shared setup for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    /// Creates the job's experiment and saves models.
    Leader,
    /// Waits for the leader's experiment; never saves models.
    Follower,
}

impl WorkerRole {
    /// Role implied by the "worker-0 is leader" naming convention.
    #[must_use]
    pub fn from_worker_id(worker_id: &str) -> Self {
        if worker_id == LEADER_WORKER_ID {
            Self::Leader
        } else {
            Self::Follower
        }
    }
}

/// Identity of this process within a training job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    job_id: String,
    worker_id: String,
    role: WorkerRole,
    parameter_server: bool,
}

#[derive(Debug, Deserialize)]
struct TfConfig {
    #[serde(default)]
    cluster: serde_json::Map<String, Value>,
    task: Option<TfTask>,
}

#[derive(Debug, Deserialize)]
struct TfTask {
    #[serde(rename = "type")]
    task_type: String,
    index: u32,
}

impl JobContext {
    /// Create a context with an explicit role.
    #[must_use]
    pub fn new(job_id: impl Into<String>, worker_id: impl Into<String>, role: WorkerRole) -> Self {
        Self {
            job_id: job_id.into(),
            worker_id: worker_id.into(),
            role,
            parameter_server: false,
        }
    }

    /// Mark the job as using (or not using) a parameter-server strategy.
    #[must_use]
    pub const fn with_parameter_server(mut self, parameter_server: bool) -> Self {
        self.parameter_server = parameter_server;
        self
    }

    /// Resolve the context from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `TF_CONFIG` is set but is not a valid
    /// cluster spec.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the context through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `TF_CONFIG` is set but is not a valid
    /// cluster spec.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let (worker_id, parameter_server) = if let Some(raw) = get(TF_CONFIG_ENV) {
            let tf_config: TfConfig = serde_json::from_str(&raw)?;
            let worker_id = tf_config.task.map_or_else(
                || LEADER_WORKER_ID.to_string(),
                |task| format!("{}-{}", task.task_type, task.index),
            );
            (worker_id, tf_config.cluster.contains_key("ps"))
        } else if let Some(rank) = get(RANK_ENV) {
            (format!("worker-{rank}"), false)
        } else {
            (LEADER_WORKER_ID.to_string(), false)
        };

        let job_id = get(JOB_ID_ENV).unwrap_or_else(|| format!("local-{}", Uuid::new_v4().simple()));
        let role = WorkerRole::from_worker_id(&worker_id);

        Ok(Self {
            job_id,
            worker_id,
            role,
            parameter_server,
        })
    }

    /// Get the job id (also the experiment name).
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the worker id (also the run name).
    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Get the worker's role.
    #[must_use]
    pub const fn role(&self) -> WorkerRole {
        self.role
    }

    /// Whether this worker is the leader.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.role == WorkerRole::Leader
    }

    /// Whether the job runs a parameter-server strategy.
    #[must_use]
    pub const fn parameter_server(&self) -> bool {
        self.parameter_server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;

    fn context(vars: &[(&str, &str)]) -> Result<JobContext> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        JobContext::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_local_training() {
        let ctx = context(&[]).unwrap();
        assert_eq!(ctx.worker_id(), "worker-0");
        assert!(ctx.is_leader());
        assert!(ctx.job_id().starts_with("local-"));
        assert!(!ctx.parameter_server());
    }

    #[test]
    fn test_pytorch_rank() {
        let ctx = context(&[(RANK_ENV, "3"), (JOB_ID_ENV, "job-1")]).unwrap();
        assert_eq!(ctx.worker_id(), "worker-3");
        assert_eq!(ctx.job_id(), "job-1");
        assert_eq!(ctx.role(), WorkerRole::Follower);
    }

    #[test]
    fn test_tf_config_worker() {
        let tf = r#"{"cluster": {"worker": ["a:2222", "b:2222"]}, "task": {"type": "worker", "index": 0}}"#;
        let ctx = context(&[(TF_CONFIG_ENV, tf), (JOB_ID_ENV, "job-2")]).unwrap();
        assert_eq!(ctx.worker_id(), "worker-0");
        assert!(ctx.is_leader());
        assert!(!ctx.parameter_server());
    }

    #[test]
    fn test_tf_config_parameter_server() {
        let tf = r#"{"cluster": {"ps": ["p:2222"], "worker": ["a:2222"]}, "task": {"type": "ps", "index": 0}}"#;
        let ctx = context(&[(TF_CONFIG_ENV, tf)]).unwrap();
        assert_eq!(ctx.worker_id(), "ps-0");
        assert!(ctx.parameter_server());
        assert_eq!(ctx.role(), WorkerRole::Follower);
    }

    #[test]
    fn test_tf_config_malformed() {
        let err = context(&[(TF_CONFIG_ENV, "{not json")]).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_explicit_role_wins() {
        let ctx = JobContext::new("job-1", "worker-5", WorkerRole::Leader);
        assert!(ctx.is_leader());
    }
}
