//! Model Version - one registered version of a named model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ModelVersionTag;
use crate::{Error, Result};

/// Lifecycle stage of a model version in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelStage {
    /// Registered but not assigned to a stage.
    #[default]
    None,
    /// Candidate under validation.
    Staging,
    /// Serving production traffic.
    Production,
    /// Retired.
    Archived,
}

impl ModelStage {
    /// Canonical stage name as stored by the registry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::Archived => "Archived",
        }
    }
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            "archived" => Ok(Self::Archived),
            _ => Err(Error::InvalidArgument(format!("invalid model stage: {s}"))),
        }
    }
}

/// A versioned, named model in the registry.
///
/// Tags are flattened to their string values when the version is built, so
/// `tags()` is a plain ordered list rather than a list of tag entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    name: String,
    version: i64,
    source: String,
    user_id: String,
    experiment_id: String,
    current_stage: ModelStage,
    creation_time: DateTime<Utc>,
    last_updated_time: DateTime<Utc>,
    dataset: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
}

impl ModelVersion {
    /// Create a model version with every field given, as read back from the
    /// registry. Tag entities are flattened to their values in order.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        version: i64,
        source: impl Into<String>,
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        current_stage: ModelStage,
        creation_time: DateTime<Utc>,
        last_updated_time: DateTime<Utc>,
        dataset: Option<String>,
        description: Option<String>,
        tags: Vec<ModelVersionTag>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            source: source.into(),
            user_id: user_id.into(),
            experiment_id: experiment_id.into(),
            current_stage,
            creation_time,
            last_updated_time,
            dataset,
            description,
            tags: tags.into_iter().map(ModelVersionTag::into_inner).collect(),
        }
    }

    /// Create a builder for a model version. Fields without a setter call
    /// get the defaults listed on [`ModelVersionBuilder::new`].
    ///
    /// # Arguments
    ///
    /// * `name` - Registered model name
    /// * `version` - Version number, unique within `name`
    /// * `source` - Location of the model artifacts
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        version: i64,
        source: impl Into<String>,
    ) -> ModelVersionBuilder {
        ModelVersionBuilder::new(name, version, source)
    }

    /// Get the registered model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the version number.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Get the artifact source path.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the id of the user that registered this version.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the experiment the version was produced by.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the current lifecycle stage.
    #[must_use]
    pub const fn current_stage(&self) -> ModelStage {
        self.current_stage
    }

    /// Get the registration timestamp.
    #[must_use]
    pub const fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Get the timestamp of the last registry update.
    #[must_use]
    pub const fn last_updated_time(&self) -> DateTime<Utc> {
        self.last_updated_time
    }

    /// Get the dataset the model was trained on, if recorded.
    #[must_use]
    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    /// Get the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the tag values in the order they were supplied.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn renamed(mut self, name: &str, at: DateTime<Utc>) -> Self {
        name.clone_into(&mut self.name);
        self.last_updated_time = at;
        self
    }

    pub(crate) fn staged(mut self, stage: ModelStage, at: DateTime<Utc>) -> Self {
        self.current_stage = stage;
        self.last_updated_time = at;
        self
    }
}

/// Builder for `ModelVersion`.
#[derive(Debug)]
pub struct ModelVersionBuilder {
    name: String,
    version: i64,
    source: String,
    user_id: String,
    experiment_id: String,
    current_stage: ModelStage,
    creation_time: DateTime<Utc>,
    last_updated_time: DateTime<Utc>,
    dataset: Option<String>,
    description: Option<String>,
    tags: Vec<ModelVersionTag>,
}

impl ModelVersionBuilder {
    /// Create a new builder with required fields.
    ///
    /// Both timestamps default to now and the stage defaults to `None`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: i64, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            version,
            source: source.into(),
            user_id: String::new(),
            experiment_id: String::new(),
            current_stage: ModelStage::None,
            creation_time: now,
            last_updated_time: now,
            dataset: None,
            description: None,
            tags: Vec::new(),
        }
    }

    /// Set the registering user.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the originating experiment.
    #[must_use]
    pub fn experiment_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = experiment_id.into();
        self
    }

    /// Set the lifecycle stage.
    #[must_use]
    pub const fn current_stage(mut self, stage: ModelStage) -> Self {
        self.current_stage = stage;
        self
    }

    /// Set the registration timestamp.
    #[must_use]
    pub const fn creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = creation_time;
        self
    }

    /// Set the last-updated timestamp.
    #[must_use]
    pub const fn last_updated_time(mut self, last_updated_time: DateTime<Utc>) -> Self {
        self.last_updated_time = last_updated_time;
        self
    }

    /// Set the training dataset.
    #[must_use]
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the tags. Order is preserved.
    #[must_use]
    pub fn tags(mut self, tags: Vec<ModelVersionTag>) -> Self {
        self.tags = tags;
        self
    }

    /// Build the `ModelVersion`.
    #[must_use]
    pub fn build(self) -> ModelVersion {
        ModelVersion {
            name: self.name,
            version: self.version,
            source: self.source,
            user_id: self.user_id,
            experiment_id: self.experiment_id,
            current_stage: self.current_stage,
            creation_time: self.creation_time,
            last_updated_time: self.last_updated_time,
            dataset: self.dataset,
            description: self.description,
            tags: self
                .tags
                .into_iter()
                .map(ModelVersionTag::into_inner)
                .collect(),
        }
    }
}
