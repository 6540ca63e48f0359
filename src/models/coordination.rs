//! Experiment resolution across the workers of a job
//!
//! Every worker of a job logs into the same experiment, named after the job
//! id. Exactly one worker, the leader, creates it; the others wait until it
//! shows up. Nothing guards against two processes both claiming to be the
//! leader: the orchestrator must assign roles uniquely.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::PollPolicy;
use crate::environment::WorkerRole;
use crate::tracking::TrackingBackend;
use crate::{Error, Result};

/// Return the id of the experiment called `name`, creating it if this
/// worker is the leader, or waiting for the leader to create it otherwise.
///
/// An existing experiment is returned without modifying the backend. A
/// follower re-queries according to `policy`; with the default policy it
/// waits indefinitely.
///
/// # Errors
///
/// Propagates backend errors unchanged. Returns
/// `Error::ExperimentWaitTimeout` when a bounded `policy` runs out.
pub async fn resolve_experiment<B: TrackingBackend>(
    backend: &B,
    name: &str,
    role: WorkerRole,
    policy: &PollPolicy,
) -> Result<String> {
    if let Some(experiment) = backend.get_experiment_by_name(name).await? {
        debug!(experiment = name, experiment_id = experiment.experiment_id(), "experiment found");
        return Ok(experiment.experiment_id().to_string());
    }

    match role {
        WorkerRole::Leader => {
            let experiment_id = backend.create_experiment(name).await?;
            info!(experiment = name, experiment_id = %experiment_id, "experiment created");
            Ok(experiment_id)
        }
        WorkerRole::Follower => wait_for_experiment(backend, name, policy).await,
    }
}

async fn wait_for_experiment<B: TrackingBackend>(
    backend: &B,
    name: &str,
    policy: &PollPolicy,
) -> Result<String> {
    info!(experiment = name, "waiting for the leader to create the experiment");
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let elapsed = started.elapsed();
        if !policy.allows(attempts, elapsed) {
            return Err(Error::ExperimentWaitTimeout {
                name: name.to_string(),
                attempts,
            });
        }

        let mut delay = policy.delay(attempts);
        if let Some(limit) = policy.timeout {
            delay = delay.min(limit.saturating_sub(elapsed));
        }
        tokio::time::sleep(delay).await;
        attempts = attempts.saturating_add(1);

        if let Some(experiment) = backend.get_experiment_by_name(name).await? {
            info!(
                experiment = name,
                experiment_id = experiment.experiment_id(),
                attempts,
                "experiment appeared"
            );
            return Ok(experiment.experiment_id().to_string());
        }
        debug!(experiment = name, attempts, "experiment not created yet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::MemoryTrackingBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn test_existing_experiment_is_returned() {
        let backend = MemoryTrackingBackend::new();
        let id = backend.create_experiment("job-1").await.unwrap();
        let mutations = backend.mutations();

        for role in [WorkerRole::Leader, WorkerRole::Follower] {
            let found = resolve_experiment(&backend, "job-1", role, &PollPolicy::default())
                .await
                .unwrap();
            assert_eq!(found, id);
        }
        assert_eq!(backend.mutations(), mutations);
    }

    #[tokio::test]
    async fn test_leader_creates_missing_experiment() {
        let backend = MemoryTrackingBackend::new();
        let id = resolve_experiment(&backend, "job-2", WorkerRole::Leader, &PollPolicy::default())
            .await
            .unwrap();
        assert_eq!(backend.experiment_count(), 1);
        assert_eq!(backend.mutations(), 1);
        assert_eq!(
            backend.get_experiment_by_name("job-2").await.unwrap().unwrap().experiment_id(),
            id
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_follower_times_out() {
        let backend = MemoryTrackingBackend::new();
        let policy = PollPolicy::bounded(3, Duration::from_secs(3600));
        let err = resolve_experiment(&backend, "job-3", WorkerRole::Follower, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExperimentWaitTimeout { attempts: 3, .. }));
        assert_eq!(backend.experiment_count(), 0);
        // initial lookup + 3 re-queries
        assert_eq!(backend.experiment_lookups(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_respects_wall_clock_timeout() {
        let backend = MemoryTrackingBackend::new();
        let policy = PollPolicy::bounded(u32::MAX, Duration::from_secs(10));
        let started = Instant::now();
        let err = resolve_experiment(&backend, "job-4", WorkerRole::Follower, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExperimentWaitTimeout { .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }
}
