//! Logistic regression propensity estimator.
//!
//! Plain gradient descent with L2 regularization over standardized
//! common-cause columns. Binary treatments get a single model; categorical
//! treatments are handled one-vs-rest with normalized probabilities.

use crate::models::{Dataset, EstimatorConfig, InterveneError, Result, Value};
use crate::propensity::{check_fit_inputs, PropensityEstimator, PropensityModel};
use tracing::debug;

/// Logistic regression estimator.
#[derive(Debug, Clone, Default)]
pub struct LogisticEstimator {
    config: EstimatorConfig,
}

impl LogisticEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }
}

/// Fitted logistic propensity model.
pub struct LogisticModel {
    treatment: String,
    common_causes: Vec<String>,
    /// Distinct treatment levels, in order of first appearance
    levels: Vec<Value>,
    /// One weight vector per level for one-vs-rest; exactly one vector
    /// (for `levels[1]`) in the binary case. Index 0 is the intercept.
    weights: Vec<Vec<f64>>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gradient descent on regularized logistic loss. `xs` rows carry the
/// intercept in position 0; the intercept is not regularized.
fn train_binary(xs: &[Vec<f64>], y: &[f64], config: &EstimatorConfig) -> Vec<f64> {
    let n = xs.len() as f64;
    let dim = xs[0].len();
    let mut w = vec![0.0; dim];

    for iteration in 0..config.max_iterations {
        let mut grad = vec![0.0; dim];
        for (x, yi) in xs.iter().zip(y) {
            let z: f64 = w.iter().zip(x).map(|(wi, xi)| wi * xi).sum();
            let err = sigmoid(z) - yi;
            for (g, xi) in grad.iter_mut().zip(x) {
                *g += err * xi;
            }
        }
        let mut norm_sq = 0.0;
        for (j, g) in grad.iter_mut().enumerate() {
            *g /= n;
            if j > 0 {
                *g += config.l2 * w[j];
            }
            norm_sq += *g * *g;
        }
        for (wj, g) in w.iter_mut().zip(&grad) {
            *wj -= config.learning_rate * g;
        }
        if norm_sq.sqrt() < config.tolerance {
            debug!(iteration, "logistic fit converged");
            break;
        }
    }
    w
}

impl PropensityEstimator for LogisticEstimator {
    fn fit(
        &self,
        data: &Dataset,
        treatment: &str,
        common_causes: &[String],
    ) -> Result<Box<dyn PropensityModel>> {
        let levels = check_fit_inputs(data, treatment, common_causes)?;

        // Standardize predictors for a stable descent.
        let n = data.n_rows();
        let mut features: Vec<Vec<f64>> = Vec::with_capacity(common_causes.len());
        let mut means = Vec::with_capacity(common_causes.len());
        let mut stds = Vec::with_capacity(common_causes.len());
        for cause in common_causes {
            let raw = data.numeric(cause)?;
            let mean = raw.iter().sum::<f64>() / n as f64;
            let var = raw.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let std = if var > 0.0 { var.sqrt() } else { 1.0 };
            means.push(mean);
            stds.push(std);
            features.push(raw.iter().map(|v| (v - mean) / std).collect());
        }

        let xs: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let mut row = Vec::with_capacity(common_causes.len() + 1);
                row.push(1.0);
                for column in &features {
                    row.push(column[i]);
                }
                row
            })
            .collect();

        let observed = data.column(treatment)?;
        let targets = if levels.len() == 2 {
            // Single model for P(t == levels[1])
            vec![levels[1]]
        } else {
            levels.clone()
        };

        let mut weights = Vec::with_capacity(targets.len());
        for target in &targets {
            let y: Vec<f64> = observed
                .iter()
                .map(|t| if t == target { 1.0 } else { 0.0 })
                .collect();
            weights.push(train_binary(&xs, &y, &self.config));
        }

        debug!(
            treatment,
            causes = common_causes.len(),
            levels = levels.len(),
            rows = n,
            "fitted logistic propensity model"
        );

        Ok(Box::new(LogisticModel {
            treatment: treatment.to_string(),
            common_causes: common_causes.to_vec(),
            levels,
            weights,
            means,
            stds,
        }))
    }
}

impl LogisticModel {
    fn score(&self, weights: &[f64], data: &Dataset, row: usize) -> Result<f64> {
        let mut z = weights[0];
        for (j, cause) in self.common_causes.iter().enumerate() {
            let x = data.column(cause)?[row].as_f64();
            z += weights[j + 1] * (x - self.means[j]) / self.stds[j];
        }
        Ok(sigmoid(z))
    }
}

impl PropensityModel for LogisticModel {
    fn predict(&self, data: &Dataset, row: usize) -> Result<f64> {
        let observed = data.column(&self.treatment)?[row];
        let level_idx = self
            .levels
            .iter()
            .position(|l| *l == observed)
            .ok_or_else(|| {
                InterveneError::Internal(format!(
                    "treatment value {observed} at row {row} was not seen during fitting"
                ))
            })?;

        if self.levels.len() == 2 {
            let p_high = self.score(&self.weights[0], data, row)?;
            Ok(if level_idx == 1 { p_high } else { 1.0 - p_high })
        } else {
            // One-vs-rest scores, normalized to a proper distribution.
            let mut scores = Vec::with_capacity(self.levels.len());
            for weights in &self.weights {
                scores.push(self.score(weights, data, row)?);
            }
            let total: f64 = scores.iter().sum();
            if total <= 0.0 {
                return Err(InterveneError::Internal(
                    "one-vs-rest scores sum to zero".to_string(),
                ));
            }
            Ok(scores[level_idx] / total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confounded(n: usize) -> Dataset {
        // z drives d deterministically-ish: d = (z > 0.5)
        let z: Vec<Value> = (0..n).map(|i| Value::Float(i as f64 / n as f64)).collect();
        let d: Vec<Value> = (0..n)
            .map(|i| Value::Bool(i as f64 / n as f64 > 0.5))
            .collect();
        Dataset::from_columns(vec![("z".to_string(), z), ("d".to_string(), d)]).unwrap()
    }

    #[test]
    fn fit_recovers_direction_of_confounding() {
        let data = confounded(200);
        let estimator = LogisticEstimator::default();
        let model = estimator
            .fit(&data, "d", &["z".to_string()])
            .expect("fit should succeed");

        // High-z treated rows should get higher propensity than low-z
        // untreated rows get for treatment.
        let p_last = model.predict(&data, 199).unwrap(); // z≈1, d=true
        let p_first = model.predict(&data, 0).unwrap(); // z=0, d=false
        assert!(p_last > 0.5, "p_last = {p_last}");
        assert!(p_first > 0.5, "p_first = {p_first}");
    }

    #[test]
    fn predictions_stay_in_open_interval() {
        let data = confounded(100);
        let model = LogisticEstimator::default()
            .fit(&data, "d", &["z".to_string()])
            .unwrap();
        for row in 0..data.n_rows() {
            let p = model.predict(&data, row).unwrap();
            assert!(p > 0.0 && p < 1.0, "row {row}: p = {p}");
        }
    }

    #[test]
    fn single_level_treatment_fails_fit() {
        let data = Dataset::from_columns(vec![
            ("z".to_string(), vec![Value::Float(0.1), Value::Float(0.9)]),
            ("d".to_string(), vec![Value::Bool(true), Value::Bool(true)]),
        ])
        .unwrap();
        let err = LogisticEstimator::default()
            .fit(&data, "d", &["z".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, InterveneError::ModelFit { .. }));
    }

    #[test]
    fn empty_common_causes_fail_fit() {
        let data = confounded(10);
        let err = LogisticEstimator::default()
            .fit(&data, "d", &[])
            .err()
            .unwrap();
        assert!(matches!(err, InterveneError::ModelFit { .. }));
    }

    #[test]
    fn continuous_treatment_fails_fit() {
        let data = Dataset::from_columns(vec![
            ("z".to_string(), vec![Value::Float(0.1), Value::Float(0.9)]),
            ("d".to_string(), vec![Value::Float(0.2), Value::Float(0.7)]),
        ])
        .unwrap();
        let err = LogisticEstimator::default()
            .fit(&data, "d", &["z".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, InterveneError::ModelFit { .. }));
    }

    #[test]
    fn categorical_probabilities_normalize() {
        let n = 90;
        let z: Vec<Value> = (0..n).map(|i| Value::Float(i as f64 / n as f64)).collect();
        let d: Vec<Value> = (0..n).map(|i| Value::Level((i % 3) as i64)).collect();
        let data =
            Dataset::from_columns(vec![("z".to_string(), z), ("d".to_string(), d)]).unwrap();
        let model = LogisticEstimator::default()
            .fit(&data, "d", &["z".to_string()])
            .unwrap();
        for row in 0..5 {
            let p = model.predict(&data, row).unwrap();
            assert!(p > 0.0 && p < 1.0);
        }
    }
}
