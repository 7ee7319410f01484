//! Configuration models for intervene.
//!
//! Everything the caller can resolve at runtime is parameterized here and
//! loaded from a TOML file.

use crate::models::{ColumnType, Identification, VariableRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration for intervene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Variable roles and declared types
    pub variables: VariablesConfig,

    /// Identified estimand, as produced by the external identification step
    pub identification: Identification,

    /// Sampling behavior
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Propensity estimator hyperparameters
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

/// Variable roles and types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablesConfig {
    /// Treatment column (the variable being intervened on)
    pub treatment: String,

    /// Outcome column
    pub outcome: String,

    /// Declared column types; columns not listed are inferred from data
    #[serde(default)]
    pub types: HashMap<String, ColumnType>,
}

/// Sampling behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Skip stage 2 and keep the observed treatment assignment.
    /// Any supplied intervention is ignored when this is set.
    #[serde(default)]
    pub keep_original_treatment: bool,

    /// Retain the working frame and fitted model across draws
    #[serde(default)]
    pub stateful: bool,

    /// Sample even when the effect is not identified (explicit opt-in;
    /// never an interactive prompt)
    #[serde(default)]
    pub proceed_despite_unidentified: bool,

    /// Rows per draw (default: input row count)
    #[serde(default)]
    pub sample_size: Option<usize>,

    /// Clamp fitted propensities into `[clip, 1 - clip]` before inversion.
    /// Off by default: degenerate scores are errors, not silently clipped.
    #[serde(default)]
    pub propensity_clip: Option<f64>,

    /// Append the inverse-propensity weight of each sampled row as a
    /// `weight` column on the output
    #[serde(default)]
    pub include_weights: bool,

    /// RNG seed for reproducible draws (default: entropy)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of draws for batch runs
    #[serde(default = "default_draws")]
    pub draws: usize,
}

fn default_draws() -> usize {
    1
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            keep_original_treatment: false,
            stateful: false,
            proceed_despite_unidentified: false,
            sample_size: None,
            propensity_clip: None,
            include_weights: false,
            seed: None,
            draws: default_draws(),
        }
    }
}

/// Propensity estimator hyperparameters (logistic regression).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Gradient descent learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// L2 regularization coefficient
    #[serde(default = "default_l2")]
    pub l2: f64,

    /// Maximum gradient descent iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Convergence threshold on the gradient norm
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_l2() -> f64 {
    0.01
}

fn default_max_iterations() -> u32 {
    1000
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            l2: default_l2(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate role disjointness and parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variables.treatment == self.variables.outcome {
            return Err(ConfigError::Invalid(
                "treatment and outcome must be different columns".to_string(),
            ));
        }
        for cause in &self.identification.common_causes {
            if *cause == self.variables.treatment {
                return Err(ConfigError::Invalid(format!(
                    "'{cause}' cannot be both treatment and common cause"
                )));
            }
            if *cause == self.variables.outcome {
                return Err(ConfigError::Invalid(format!(
                    "'{cause}' cannot be both outcome and common cause"
                )));
            }
        }
        if let Some(clip) = self.sampling.propensity_clip {
            if !(clip > 0.0 && clip < 0.5) {
                return Err(ConfigError::Invalid(format!(
                    "propensity_clip must be in (0, 0.5), got {clip}"
                )));
            }
        }
        if let Some(size) = self.sampling.sample_size {
            if size == 0 {
                return Err(ConfigError::Invalid("sample_size must be >= 1".to_string()));
            }
        }
        if self.sampling.draws == 0 {
            return Err(ConfigError::Invalid("draws must be >= 1".to_string()));
        }
        if self.estimator.learning_rate <= 0.0 {
            return Err(ConfigError::Invalid(
                "estimator.learning_rate must be positive".to_string(),
            ));
        }
        if self.estimator.l2 < 0.0 {
            return Err(ConfigError::Invalid(
                "estimator.l2 must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Causal role of a column under this configuration.
    ///
    /// The config declares no instrument columns; the weighting strategy
    /// never uses them, so they classify as [`VariableRole::Unrelated`].
    pub fn role_of(&self, column: &str) -> VariableRole {
        if column == self.variables.treatment {
            VariableRole::Treatment
        } else if column == self.variables.outcome {
            VariableRole::Outcome
        } else if self
            .identification
            .common_causes
            .iter()
            .any(|c| c == column)
        {
            VariableRole::CommonCause
        } else {
            VariableRole::Unrelated
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
