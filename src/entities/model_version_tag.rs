//! Model version tag

use serde::{Deserialize, Serialize};

/// Free-form tag attached to a model version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ModelVersionTag {
    tag: String,
}

impl ModelVersionTag {
    /// Create a tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Get the tag value.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Consume the tag and return its value.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.tag
    }
}

impl From<&str> for ModelVersionTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for ModelVersionTag {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}
