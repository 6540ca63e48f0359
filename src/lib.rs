//! # Submarine Models: experiment tracking and model persistence for training jobs
//!
//! **Version**: 0.1.0
//!
//! Client library used from inside the workers of a distributed training job
//! to record parameters and metrics against a tracking server, persist
//! trained models, and manage registered model versions.
//!
//! ## Coordination model
//!
//! - The experiment is named after the job id; every worker logs into it
//! - Each worker gets its own run, named after its worker id
//! - Only the leader (`worker-0`) creates the experiment and saves models
//! - Other workers wait for the experiment to appear before starting
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use submarine_models::{ClientConfig, ModelsClient};
//!
//! # async fn train() -> submarine_models::Result<()> {
//! let mut client = ModelsClient::connect(ClientConfig::from_env())?;
//! client.start().await?;
//!
//! for epoch in 0..3 {
//!     client.log_metric("loss", 1.0 / f64::from(epoch + 1), Some(i64::from(epoch))).await?;
//! }
//! client
//!     .save_model("pytorch", b"state-dict".as_slice(), "model", Some("mnist"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifacts;
pub mod config;
pub mod entities;
pub mod environment;
pub mod error;
mod http;
pub mod logging;
pub mod models;
pub mod optimizer;
pub mod tracking;

pub use config::{ClientConfig, Credentials, PollPolicy};
pub use environment::{JobContext, WorkerRole};
pub use error::{Error, Result};
pub use models::{LoadedModel, Model, ModelType, ModelsClient};
pub use optimizer::{get_optimizer, OptimizerConfig, OptimizerKey};
