//! Optimizer registry
//!
//! Maps a case-insensitive optimizer name to a training optimizer
//! configuration with that optimizer's default hyper-parameters.
//!
//! ```rust
//! use submarine_models::optimizer::{get_optimizer, OptimizerKey};
//!
//! let optimizer = get_optimizer("Adam")?.with_learning_rate(0.01);
//! assert_eq!(optimizer.key(), OptimizerKey::Adam);
//! # Ok::<(), submarine_models::Error>(())
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Supported optimizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKey {
    /// Adam
    Adam,
    /// Adagrad
    Adagrad,
    /// Stochastic gradient descent
    Sgd,
}

impl OptimizerKey {
    /// All supported optimizers.
    pub const ALL: [Self; 3] = [Self::Adam, Self::Adagrad, Self::Sgd];

    /// Lowercase registry key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adam => "adam",
            Self::Adagrad => "adagrad",
            Self::Sgd => "sgd",
        }
    }
}

impl fmt::Display for OptimizerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "adagrad" => Ok(Self::Adagrad),
            "sgd" => Ok(Self::Sgd),
            _ => Err(Error::InvalidArgument(format!("Invalid optimizer_key: {s}"))),
        }
    }
}

/// Optimizer configuration ready to hand to a trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    key: OptimizerKey,
    learning_rate: f64,
    /// Adam only: (beta1, beta2)
    betas: Option<(f64, f64)>,
    /// Adam only
    eps: Option<f64>,
    /// SGD only
    momentum: Option<f64>,
}

impl OptimizerConfig {
    /// Configuration with the optimizer's default hyper-parameters.
    #[must_use]
    pub const fn new(key: OptimizerKey) -> Self {
        match key {
            OptimizerKey::Adam => Self {
                key,
                learning_rate: 1e-3,
                betas: Some((0.9, 0.999)),
                eps: Some(1e-8),
                momentum: None,
            },
            OptimizerKey::Adagrad => Self {
                key,
                learning_rate: 1e-2,
                betas: None,
                eps: None,
                momentum: None,
            },
            OptimizerKey::Sgd => Self {
                key,
                learning_rate: 1e-3,
                betas: None,
                eps: None,
                momentum: Some(0.0),
            },
        }
    }

    /// Override the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Get the optimizer key.
    #[must_use]
    pub const fn key(&self) -> OptimizerKey {
        self.key
    }

    /// Get the learning rate.
    #[must_use]
    pub const fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Get Adam's beta coefficients.
    #[must_use]
    pub const fn betas(&self) -> Option<(f64, f64)> {
        self.betas
    }

    /// Get Adam's epsilon.
    #[must_use]
    pub const fn eps(&self) -> Option<f64> {
        self.eps
    }

    /// Get SGD's momentum.
    #[must_use]
    pub const fn momentum(&self) -> Option<f64> {
        self.momentum
    }

    /// Render as run parameters (`optimizer`, `learning_rate`, ...).
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("optimizer".to_string(), self.key.to_string()),
            ("learning_rate".to_string(), self.learning_rate.to_string()),
        ];
        if let Some((beta1, beta2)) = self.betas {
            params.push(("beta1".to_string(), beta1.to_string()));
            params.push(("beta2".to_string(), beta2.to_string()));
        }
        if let Some(eps) = self.eps {
            params.push(("eps".to_string(), eps.to_string()));
        }
        if let Some(momentum) = self.momentum {
            params.push(("momentum".to_string(), momentum.to_string()));
        }
        params
    }
}

/// Look up an optimizer by name, ignoring case.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` naming `key` if it is not one of
/// "adam", "adagrad" or "sgd".
pub fn get_optimizer(key: &str) -> Result<OptimizerConfig> {
    key.parse::<OptimizerKey>().map(OptimizerConfig::new)
}
