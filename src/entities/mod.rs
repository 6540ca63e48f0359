//! Tracking and registry entities
//!
//! Read-only value objects handed out by a tracking backend. Callers own
//! what they receive; entities hold no back-references to the backend.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Run (N) ──< Metric (N) [time-series per worker]
//!                         │
//!                         └──< Param (N)
//!
//! ModelVersion (N per registered name) ──< ModelVersionTag (N) [flattened]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use submarine_models::entities::{ModelStage, ModelVersion, ModelVersionTag};
//!
//! let version = ModelVersion::builder("mnist", 1, "s3://submarine/mnist/1")
//!     .current_stage(ModelStage::Staging)
//!     .tags(vec![ModelVersionTag::new("cnn")])
//!     .build();
//!
//! assert_eq!(version.tags(), ["cnn"]);
//! ```

mod experiment;
mod metric;
mod model_version;
mod model_version_tag;
mod run;

pub use experiment::Experiment;
pub use metric::Metric;
pub use model_version::{ModelStage, ModelVersion, ModelVersionBuilder};
pub use model_version_tag::ModelVersionTag;
pub use run::{Param, Run, RunStatus};
