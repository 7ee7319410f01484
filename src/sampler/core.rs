//! The abstract three-stage sampler contract and its working state.

use crate::models::{Dataset, InterveneError, Result, Stage};
use crate::sampler::InterventionSpec;
use rand::RngCore;

/// Mutable dataset copy a pipeline run works against.
///
/// Stateless sessions build a fresh frame per draw and drop it afterwards;
/// stateful sessions retain one frame and mutate it in place until reset.
#[derive(Debug, Clone)]
pub struct WorkingFrame {
    data: Dataset,
    /// Per-row auxiliary weights attached by `disrupt`
    weights: Option<Vec<f64>>,
    /// Rows eligible for resampling after `make_effective` restricted the
    /// frame to the forced treatment's observed support; `None` = all rows
    eligible: Option<Vec<usize>>,
}

impl WorkingFrame {
    pub fn new(data: Dataset) -> Self {
        Self {
            data,
            weights: None,
            eligible: None,
        }
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Dataset {
        &mut self.data
    }

    pub fn n_rows(&self) -> usize {
        self.data.n_rows()
    }

    pub fn set_weights(&mut self, weights: Vec<f64>) {
        self.weights = Some(weights);
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Weights, failing with the given stage when `disrupt` has not run.
    pub fn require_weights(&self, stage: Stage) -> Result<&[f64]> {
        self.weights.as_deref().ok_or_else(|| {
            InterveneError::sampling(stage, "disrupt must run before this stage")
        })
    }

    pub fn set_eligible(&mut self, rows: Vec<usize>) {
        self.eligible = Some(rows);
    }

    /// Lift any support restriction left by an earlier `make_effective`.
    pub fn clear_eligible(&mut self) {
        self.eligible = None;
    }

    pub fn eligible(&self) -> Option<&[usize]> {
        self.eligible.as_deref()
    }
}

/// The three-stage do-sampler contract.
///
/// Stage 0 (`fit`) runs once per session fit; the three pipeline stages run
/// strictly in order for every sample production:
///
/// 1. `disrupt`: sever the statistical dependence of treatment on its
///    common causes, recorded as auxiliary per-row state rather than by
///    altering recorded values
/// 2. `make_effective`: apply the intervention
/// 3. `propagate_and_sample`: produce a draw from the implied
///    interventional distribution
///
/// Any stage failure aborts the pipeline with no partial result.
pub trait DoSampler: Send {
    /// Fit whatever model the strategy needs, once, from the original data.
    /// Fails with `IdentificationError` when the estimand is not identified
    /// and the sampler was not told to proceed anyway.
    fn fit(&mut self, data: &Dataset) -> Result<()>;

    /// Whether `fit` has completed since construction or the last `reset`.
    fn is_fitted(&self) -> bool;

    /// Drop the fitted model; the next `fit` starts from scratch.
    fn reset(&mut self);

    /// Stage 1. Idempotent across calls through the same fit.
    fn disrupt(&self, frame: &mut WorkingFrame) -> Result<()>;

    /// Stage 2. Restores the observed treatment assignment (and lifts any
    /// support restriction) for `KeepObserved`; overwrites the treatment
    /// column for `ForceValue`. All other columns are preserved.
    fn make_effective(&self, frame: &mut WorkingFrame, spec: &InterventionSpec) -> Result<()>;

    /// Stage 3. Draws from the interventional distribution using the
    /// caller-supplied RNG; the result has the input schema.
    fn propagate_and_sample(&self, frame: &WorkingFrame, rng: &mut dyn RngCore)
        -> Result<Dataset>;
}

/// Summary of the disruption weights of a frame, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Kish effective sample size, `(Σw)² / Σw²`
    pub effective_sample_size: f64,
}

impl WeightSummary {
    pub fn from_weights(weights: &[f64]) -> Option<Self> {
        if weights.is_empty() {
            return None;
        }
        let sum: f64 = weights.iter().sum();
        let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &w in weights {
            min = min.min(w);
            max = max.max(w);
        }
        Some(Self {
            mean: sum / weights.len() as f64,
            min,
            max,
            effective_sample_size: if sum_sq > 0.0 { sum * sum / sum_sq } else { 0.0 },
        })
    }
}
