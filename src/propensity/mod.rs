//! Propensity score estimation.
//!
//! Provides:
//! - `PropensityEstimator` / `PropensityModel`: the fit-once, predict-many
//!   contract the weighting sampler needs from any classifier
//! - `LogisticEstimator`: the default logistic regression backend

mod estimator;
mod logistic;

pub use estimator::*;
pub use logistic::*;
