//! The estimator contract behind the weighting sampler.
//!
//! The sampler does not care which classifier produces propensity scores;
//! it needs exactly one thing from the fitted model: the probability of the
//! treatment value a row actually received, given its common causes.

use crate::models::{ColumnType, Dataset, InterveneError, Result};

/// A fitted propensity model.
///
/// Immutable once fitted; owned by the sampler that fitted it and lives
/// until that sampler is reset.
pub trait PropensityModel: Send {
    /// P(treatment = observed value at `row` | common causes at `row`),
    /// strictly inside (0, 1) for non-degenerate fits.
    fn predict(&self, data: &Dataset, row: usize) -> Result<f64>;
}

/// Fits a model predicting treatment assignment from common causes.
pub trait PropensityEstimator: Send {
    /// Fit over the given columns. Performs no mutation of the input data.
    fn fit(
        &self,
        data: &Dataset,
        treatment: &str,
        common_causes: &[String],
    ) -> Result<Box<dyn PropensityModel>>;
}

/// Shared fit-time validation: predictors present, treatment modelable.
///
/// Returns the distinct observed treatment levels.
pub(crate) fn check_fit_inputs(
    data: &Dataset,
    treatment: &str,
    common_causes: &[String],
) -> Result<Vec<crate::models::Value>> {
    if common_causes.is_empty() {
        return Err(InterveneError::ModelFit {
            column: treatment.to_string(),
            reason: "no common-cause columns to model from".to_string(),
        });
    }
    for cause in common_causes {
        data.column(cause)?;
    }

    if data.column_type(treatment)? == ColumnType::Continuous {
        return Err(InterveneError::ModelFit {
            column: treatment.to_string(),
            reason: "continuous treatment is not supported by propensity weighting".to_string(),
        });
    }

    let levels = data.support(treatment)?;
    if levels.len() < 2 {
        return Err(InterveneError::ModelFit {
            column: treatment.to_string(),
            reason: "treatment has a single observed level, nothing to model".to_string(),
        });
    }
    Ok(levels)
}
