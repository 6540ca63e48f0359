//! Experiment - named grouping of runs, one per training job

use serde::{Deserialize, Serialize};

/// A tracked experiment as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    experiment_id: String,
    name: String,
    artifact_location: String,
    lifecycle_stage: String,
}

impl Experiment {
    /// Create an active experiment record.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Backend-assigned identifier
    /// * `name` - Experiment name (the job id)
    /// * `artifact_location` - Root URI for the experiment's run artifacts
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        artifact_location: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            artifact_location: artifact_location.into(),
            lifecycle_stage: "active".to_string(),
        }
    }

    /// Set the lifecycle stage (e.g. "deleted").
    #[must_use]
    pub fn with_lifecycle_stage(mut self, stage: impl Into<String>) -> Self {
        self.lifecycle_stage = stage.into();
        self
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the artifact root URI.
    #[must_use]
    pub fn artifact_location(&self) -> &str {
        &self.artifact_location
    }

    /// Get the lifecycle stage.
    #[must_use]
    pub fn lifecycle_stage(&self) -> &str {
        &self.lifecycle_stage
    }
}
