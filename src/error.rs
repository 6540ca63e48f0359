//! Error types for the models client
//!
//! Validation errors are raised locally before any I/O. Failures reported by
//! the tracking server or artifact store are surfaced as-is.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Models client error types
#[derive(Error, Debug)]
pub enum Error {
    /// Argument rejected before reaching any backend
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Model framework string not supported by the requested operation
    #[error("No valid type of model has been matched to {0}")]
    InvalidModelType(String),

    /// Artifact path does not follow the naming rules
    #[error("Invalid artifact path {0:?}: artifact path must only contain numbers, characters, hyphen and underscore, and must start and end with numbers or characters")]
    InvalidArtifactPath(String),

    /// Resource does not exist on the backend
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists on the backend
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Run-scoped call made before `start()`
    #[error("No active run: call start() before logging to a run")]
    NoActiveRun,

    /// Follower gave up waiting for the leader to create the experiment
    #[error("Experiment {name:?} did not appear after {attempts} lookups")]
    ExperimentWaitTimeout {
        /// Experiment name that was polled for
        name: String,
        /// Number of lookups performed
        attempts: u32,
    },

    /// Backend answered with a non-success status
    #[error("Backend error ({status}, {code}): {message}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Backend error code (e.g. `INTERNAL_ERROR`)
        code: String,
        /// Backend message
        message: String,
    },

    /// HTTP transport error
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Artifact store error
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
