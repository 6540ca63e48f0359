//! On-disk layouts for serialized models
//!
//! Two layouts exist. The tracking layout is what `save_model` logs as run
//! artifacts: one framework-specific file plus an `MLmodel` descriptor. The
//! serving layout is what `save_model_submarine` uploads: a versioned model
//! repository directory that a model server can load directly, available
//! for PyTorch and TensorFlow only.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ModelType;
use crate::Result;

/// Name of the model descriptor written next to the tracking layout.
pub const MLMODEL_FILE: &str = "MLmodel";

impl ModelType {
    /// Path of the model file inside the tracking layout.
    #[must_use]
    pub const fn tracking_file(self) -> &'static str {
        match self {
            Self::PyTorch => "data/model.pth",
            Self::Sklearn => "model.pkl",
            Self::TensorFlow => "tfmodel/saved_model.pb",
            Self::Keras => "data/model.keras",
        }
    }

    /// Path of the model file inside the serving layout, `None` if the
    /// framework has no serving layout.
    #[must_use]
    pub const fn serving_file(self) -> Option<&'static str> {
        match self {
            Self::PyTorch => Some("1/model.pt"),
            Self::TensorFlow => Some("1/model.savedmodel/saved_model.pb"),
            Self::Sklearn | Self::Keras => None,
        }
    }

    fn flavor_config(self) -> Value {
        match self {
            Self::PyTorch => json!({ "model_data": "data" }),
            Self::Sklearn => json!({
                "pickled_model": "model.pkl",
                "serialization_format": "cloudpickle",
            }),
            Self::TensorFlow => json!({ "saved_model_dir": "tfmodel" }),
            Self::Keras => json!({ "data": "data", "save_format": "keras" }),
        }
    }
}

/// Model descriptor stored as `MLmodel` alongside logged model artifacts.
///
/// Written as JSON, which any YAML reader also accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlModel {
    /// Artifact path the model was logged under.
    pub artifact_path: String,
    /// Run that logged the model.
    pub run_id: String,
    /// Creation time, `%Y-%m-%d %H:%M:%S%.6f` in UTC.
    pub utc_time_created: String,
    /// Unique id of this logged model.
    pub model_uuid: String,
    /// Flavor name to flavor configuration.
    pub flavors: BTreeMap<String, Value>,
}

impl MlModel {
    /// Describe a `model_type` model logged by `run_id` under `artifact_path`.
    #[must_use]
    pub fn new(run_id: &str, artifact_path: &str, model_type: ModelType) -> Self {
        let mut flavors = BTreeMap::new();
        flavors.insert(model_type.as_str().to_string(), model_type.flavor_config());
        Self {
            artifact_path: artifact_path.to_string(),
            run_id: run_id.to_string(),
            utc_time_created: Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            model_uuid: Uuid::new_v4().simple().to_string(),
            flavors,
        }
    }

    /// The framework this descriptor was written for.
    #[must_use]
    pub fn model_type(&self) -> Option<ModelType> {
        ModelType::ALL
            .into_iter()
            .find(|t| self.flavors.contains_key(t.as_str()))
    }
}

/// Write `bytes` to `dir/relative`, creating parent directories.
pub(crate) async fn write_model_file(dir: &Path, relative: &str, bytes: &[u8]) -> Result<()> {
    let target = dir.join(relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, bytes).await?;
    Ok(())
}

/// Write the tracking layout for `model_type` and its descriptor into `dir`.
pub(crate) async fn write_tracking_layout(
    dir: &Path,
    model_type: ModelType,
    bytes: &[u8],
    descriptor: &MlModel,
) -> Result<()> {
    write_model_file(dir, model_type.tracking_file(), bytes).await?;
    write_model_file(dir, MLMODEL_FILE, &serde_json::to_vec_pretty(descriptor)?).await
}
