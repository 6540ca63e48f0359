//! Run - one worker's execution under an experiment

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is currently executing.
    Running,
    /// Run is queued.
    Scheduled,
    /// Run completed successfully.
    Finished,
    /// Run failed with an error.
    Failed,
    /// Run was killed by user or system.
    Killed,
}

impl RunStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Scheduled => "SCHEDULED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }

    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Killed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "SCHEDULED" => Ok(Self::Scheduled),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            "KILLED" => Ok(Self::Killed),
            other => Err(Error::InvalidArgument(format!("invalid run status: {other}"))),
        }
    }
}

/// A tracked run. Each worker of a job gets its own run, named after the
/// worker, under the job's experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
    run_id: String,
    experiment_id: String,
    run_name: String,
    status: RunStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    artifact_uri: String,
}

impl Run {
    /// Create a running run record started now.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        run_name: impl Into<String>,
        artifact_uri: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: run_name.into(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            artifact_uri: artifact_uri.into(),
        }
    }

    /// Override the start timestamp.
    #[must_use]
    pub const fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the run name (the worker id).
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Get the end timestamp, if the run has ended.
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Get the artifact root URI of this run.
    #[must_use]
    pub fn artifact_uri(&self) -> &str {
        &self.artifact_uri
    }

    /// Move the run to `status`, stamping the end time for terminal statuses.
    pub fn set_status(&mut self, status: RunStatus, at: DateTime<Utc>) {
        self.status = status;
        if status.is_terminal() {
            self.end_time = Some(at);
        }
    }
}

/// A logged run parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    /// Parameter name.
    pub key: String,
    /// Parameter value, stringified.
    pub value: String,
}

impl Param {
    /// Create a parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_starts_running() {
        let run = Run::new("r1", "1", "worker-0", "mlflow-artifacts:/1/r1/artifacts");
        assert_eq!(run.status(), RunStatus::Running);
        assert!(run.end_time().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = Run::new("r1", "1", "worker-0", "");
        run.set_status(RunStatus::Finished, Utc::now());
        assert_eq!(run.status(), RunStatus::Finished);
        assert!(run.end_time().unwrap() >= run.start_time());
    }

    #[test]
    fn test_run_status_wire_names() {
        for status in [
            RunStatus::Running,
            RunStatus::Scheduled,
            RunStatus::Finished,
            RunStatus::Failed,
            RunStatus::Killed,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&RunStatus::Killed).unwrap(),
            "\"KILLED\""
        );
    }
}
