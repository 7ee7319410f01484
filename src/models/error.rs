//! Error types for intervene.
//!
//! Taxonomy:
//! - Contract violations: the request itself is unusable
//! - Statistical failures: the data refuses to support the requested draw
//! - Infrastructure: IO, parsing, internal invariants

use thiserror::Error;

/// Pipeline stage in which a failure occurred.
///
/// Every error is terminal for the enclosing `sample` call; the stage tells
/// the caller where the pipeline aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Model fitting, performed once before the three-stage pipeline
    Fit,
    /// Stage 1: sever common-cause influence on treatment
    Disrupt,
    /// Stage 2: apply the intervention
    MakeEffective,
    /// Stage 3: draw from the interventional distribution
    Propagate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fit => "fit",
            Stage::Disrupt => "disrupt",
            Stage::MakeEffective => "make_effective",
            Stage::Propagate => "propagate_and_sample",
        };
        f.write_str(name)
    }
}

/// Top-level error type for intervene.
#[derive(Debug, Error)]
pub enum InterveneError {
    // ═══════════════════════════════════════════════════════════════════
    // CONTRACT VIOLATIONS: the request itself is unusable
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error(
        "Effect of '{treatment}' is not identified from observed data; \
         set proceed_despite_unidentified to sample anyway"
    )]
    Identification { treatment: String },

    #[error("An intervention is required when keep_original_treatment is false")]
    MissingIntervention,

    #[error("Intervention supplies {got} value(s) but the dataset has {expected} rows")]
    InterventionLength { expected: usize, got: usize },

    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    // ═══════════════════════════════════════════════════════════════════
    // STATISTICAL FAILURES: the data cannot support the draw
    // ═══════════════════════════════════════════════════════════════════

    #[error("Cannot fit propensity model for '{column}': {reason}")]
    ModelFit { column: String, reason: String },

    #[error(
        "Degenerate propensity {propensity} at row {row}: weight is undefined \
         (configure propensity_clip to clamp extreme scores)"
    )]
    DegeneratePropensity { row: usize, propensity: f64 },

    #[error("Requested treatment value {value} does not appear in the observed support")]
    EmptySupport { value: String },

    // ═══════════════════════════════════════════════════════════════════
    // INFRASTRUCTURE: IO, parsing, broken invariants
    // ═══════════════════════════════════════════════════════════════════

    #[error("Sampling failed in {stage}: {message}")]
    Sampling { stage: Stage, message: String },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InterveneError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a generic pipeline failure tagged with its stage.
    pub fn sampling(stage: Stage, message: impl Into<String>) -> Self {
        Self::Sampling {
            stage,
            message: message.into(),
        }
    }

    /// The pipeline stage this error aborted, if it occurred inside the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Identification { .. } | Self::ModelFit { .. } => Some(Stage::Fit),
            Self::DegeneratePropensity { .. } => Some(Stage::Disrupt),
            Self::InterventionLength { .. } => Some(Stage::MakeEffective),
            Self::EmptySupport { .. } => Some(Stage::Propagate),
            Self::Sampling { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for intervene.
pub type Result<T> = std::result::Result<T, InterveneError>;
