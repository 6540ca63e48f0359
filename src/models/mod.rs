//! Model persistence and the models client
//!
//! [`ModelsClient`] ties a training process to the tracking backend and the
//! job's artifact repository:
//!
//! ```text
//! start() ──> resolve experiment (job id) ──> create run (worker id)
//!    │
//!    ├── log_param / log_metric ...          (active run)
//!    ├── save_model(...)                      (leader only, run artifacts)
//!    └── save_model_submarine(...)            (job artifact repository)
//! ```

mod client;
mod coordination;
mod serializer;

pub use client::{LoadedModel, ModelsClient};
pub use coordination::resolve_experiment;
pub use serializer::{MlModel, MLMODEL_FILE};

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Model frameworks the client can persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// PyTorch
    PyTorch,
    /// scikit-learn
    Sklearn,
    /// TensorFlow
    TensorFlow,
    /// Keras
    Keras,
}

impl ModelType {
    /// All supported frameworks.
    pub const ALL: [Self; 4] = [Self::PyTorch, Self::Sklearn, Self::TensorFlow, Self::Keras];

    /// Framework name as accepted by `FromStr`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PyTorch => "pytorch",
            Self::Sklearn => "sklearn",
            Self::TensorFlow => "tensorflow",
            Self::Keras => "keras",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    /// Parse a framework name. Matching is exact: `"PyTorch"` is rejected.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pytorch" => Ok(Self::PyTorch),
            "sklearn" => Ok(Self::Sklearn),
            "tensorflow" => Ok(Self::TensorFlow),
            "keras" => Ok(Self::Keras),
            other => Err(Error::InvalidModelType(other.to_string())),
        }
    }
}

/// A trained model that can be written out in its framework's native
/// serialized form.
pub trait Model: Send + Sync {
    /// Serialized model bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

impl Model for [u8] {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl Model for Vec<u8> {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }
}

impl Model for serde_json::Value {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
