//! Metric - one logged data point of a worker's time series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single metric value logged by a worker.
///
/// Metrics form one time series per `(key, worker_index)` pair. Timestamps
/// are expected to grow along a series, but nothing enforces it: a new
/// value supersedes older rows rather than replacing them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    key: String,
    value: f64,
    worker_index: String,
    timestamp: DateTime<Utc>,
    step: i64,
}

impl Metric {
    /// Create a metric data point.
    ///
    /// # Arguments
    ///
    /// * `key` - Metric name (e.g., "loss", "accuracy")
    /// * `value` - Metric value
    /// * `worker_index` - Worker that logged the value (e.g., "worker-1")
    /// * `timestamp` - Wall-clock time of the measurement
    /// * `step` - Training step or epoch number
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: f64,
        worker_index: impl Into<String>,
        timestamp: DateTime<Utc>,
        step: i64,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            worker_index: worker_index.into(),
            timestamp,
            step,
        }
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the worker that logged this metric.
    #[must_use]
    pub fn worker_index(&self) -> &str {
        &self.worker_index
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get the step/epoch number.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }
}
