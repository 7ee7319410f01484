//! Inverse-propensity weighting realization of the do-sampler contract.
//!
//! Stage 1 attaches `weight = 1 / P(observed treatment | common causes)` to
//! every row, severing the common-cause → treatment dependence in
//! expectation without altering any recorded value. Stage 3 draws a
//! weighted resample (with replacement) restricted to the observed support
//! of the requested treatment.

use crate::models::{
    Config, Dataset, Identification, InterveneError, Result, Stage, Value,
};
use crate::propensity::{LogisticEstimator, PropensityEstimator, PropensityModel};
use crate::sampler::{DoSampler, InterventionSpec, WorkingFrame};
use rand::distributions::{Distribution, WeightedIndex};
use rand::RngCore;
use tracing::{debug, warn};

/// State produced by the one-time fit.
struct Fitted {
    model: Box<dyn PropensityModel>,
    /// Treatment assignment as observed at fit time; frames are clones of
    /// the fitted dataset, so row indices align even after stage 2 has
    /// overwritten a retained frame's treatment column.
    observed_treatment: Vec<Value>,
    support: Vec<Value>,
}

/// Propensity-weighting do-sampler.
pub struct WeightingSampler {
    treatment: String,
    identification: Identification,
    proceed_despite_unidentified: bool,
    clip: Option<f64>,
    sample_size: Option<usize>,
    include_weights: bool,
    estimator: Box<dyn PropensityEstimator>,
    fitted: Option<Fitted>,
}

impl WeightingSampler {
    pub fn new(
        treatment: impl Into<String>,
        identification: Identification,
        estimator: Box<dyn PropensityEstimator>,
    ) -> Self {
        Self {
            treatment: treatment.into(),
            identification,
            proceed_despite_unidentified: false,
            clip: None,
            sample_size: None,
            include_weights: false,
            estimator,
            fitted: None,
        }
    }

    /// Build a sampler with the default logistic estimator from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            treatment: config.variables.treatment.clone(),
            identification: config.identification.clone(),
            proceed_despite_unidentified: config.sampling.proceed_despite_unidentified,
            clip: config.sampling.propensity_clip,
            sample_size: config.sampling.sample_size,
            include_weights: config.sampling.include_weights,
            estimator: Box::new(LogisticEstimator::new(config.estimator.clone())),
            fitted: None,
        }
    }

    /// Clamp fitted propensities into `[clip, 1 - clip]` before inversion.
    pub fn with_clip(mut self, clip: f64) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Override the per-draw sample size (default: input row count).
    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = Some(size);
        self
    }

    /// Append each sampled row's weight as a `weight` column on the output.
    pub fn with_include_weights(mut self, include: bool) -> Self {
        self.include_weights = include;
        self
    }

    /// Sample even when the estimand is not identified.
    pub fn with_proceed_despite_unidentified(mut self, proceed: bool) -> Self {
        self.proceed_despite_unidentified = proceed;
        self
    }

    pub fn treatment(&self) -> &str {
        &self.treatment
    }

    fn fitted(&self, stage: Stage) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| InterveneError::sampling(stage, "fit must run before the pipeline"))
    }
}

impl DoSampler for WeightingSampler {
    fn fit(&mut self, data: &Dataset) -> Result<()> {
        if !self.identification.identified {
            if !self.proceed_despite_unidentified {
                return Err(InterveneError::Identification {
                    treatment: self.treatment.clone(),
                });
            }
            warn!(
                treatment = %self.treatment,
                "sampling despite unidentified effect (explicit override)"
            );
        }

        let model =
            self.estimator
                .fit(data, &self.treatment, &self.identification.common_causes)?;
        let observed_treatment = data.column(&self.treatment)?.to_vec();
        let support = data.support(&self.treatment)?;

        debug!(
            treatment = %self.treatment,
            support = support.len(),
            rows = data.n_rows(),
            "weighting sampler fitted"
        );

        self.fitted = Some(Fitted {
            model,
            observed_treatment,
            support,
        });
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn reset(&mut self) {
        self.fitted = None;
    }

    fn disrupt(&self, frame: &mut WorkingFrame) -> Result<()> {
        let fitted = self.fitted(Stage::Disrupt)?;
        let n = frame.n_rows();
        let mut weights = Vec::with_capacity(n);
        for row in 0..n {
            let mut p = fitted.model.predict(frame.data(), row)?;
            if let Some(clip) = self.clip {
                p = p.clamp(clip, 1.0 - clip);
            }
            if !(p > 0.0 && p < 1.0) || !p.is_finite() {
                return Err(InterveneError::DegeneratePropensity {
                    row,
                    propensity: p,
                });
            }
            weights.push(1.0 / p);
        }
        frame.set_weights(weights);
        Ok(())
    }

    fn make_effective(&self, frame: &mut WorkingFrame, spec: &InterventionSpec) -> Result<()> {
        spec.validate(frame.n_rows())?;
        let fitted = self.fitted(Stage::MakeEffective)?;
        if fitted.observed_treatment.len() != frame.n_rows() {
            return Err(InterveneError::sampling(
                Stage::MakeEffective,
                "frame row count differs from the fitted data",
            ));
        }

        let values = match spec {
            InterventionSpec::KeepObserved => {
                // A retained frame may still carry a previous draw's forced
                // column and support restriction.
                frame.clear_eligible();
                fitted.observed_treatment.clone()
            }
            InterventionSpec::ForceValue { .. } => {
                // Restrict resampling to rows whose observed assignment
                // matches the forced value; the weighted draw then mimics
                // randomization within that support.
                let mut eligible = Vec::new();
                let mut forced = Vec::with_capacity(frame.n_rows());
                for row in 0..frame.n_rows() {
                    let value = spec
                        .value_for_row(row)
                        .ok_or_else(|| InterveneError::Internal("missing forced value".into()))?;
                    if fitted.observed_treatment[row] == value {
                        eligible.push(row);
                    }
                    forced.push(value);
                }
                frame.set_eligible(eligible);
                forced
            }
        };
        frame.data_mut().set_column(&self.treatment, values)?;
        Ok(())
    }

    fn propagate_and_sample(
        &self,
        frame: &WorkingFrame,
        rng: &mut dyn RngCore,
    ) -> Result<Dataset> {
        let weights = frame.require_weights(Stage::Propagate)?;

        let candidates: Vec<usize> = match frame.eligible() {
            Some(rows) => rows.to_vec(),
            None => (0..frame.n_rows()).collect(),
        };
        if candidates.is_empty() {
            // Stage 2 overwrote the column with the forced values; with no
            // eligible rows, every distinct value it carries is unsupported.
            let unsupported = frame.data().support(&self.treatment)?;
            let value = if unsupported.is_empty() {
                "<empty>".to_string()
            } else {
                unsupported
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(InterveneError::EmptySupport { value });
        }

        let candidate_weights: Vec<f64> = candidates.iter().map(|&i| weights[i]).collect();
        let dist = WeightedIndex::new(&candidate_weights)
            .map_err(|e| InterveneError::sampling(Stage::Propagate, e.to_string()))?;

        let n_out = self.sample_size.unwrap_or(frame.n_rows());
        let mut picked = Vec::with_capacity(n_out);
        for _ in 0..n_out {
            picked.push(candidates[dist.sample(&mut *rng)]);
        }

        let mut sample = frame.data().select_rows(&picked)?;
        if self.include_weights {
            let weight_column: Vec<Value> =
                picked.iter().map(|&i| Value::Float(weights[i])).collect();
            sample.push_column("weight", weight_column)?;
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Estimator returning canned propensities, keyed by row index.
    struct StubEstimator {
        propensities: Vec<f64>,
    }

    struct StubModel {
        propensities: Vec<f64>,
    }

    impl PropensityModel for StubModel {
        fn predict(&self, _data: &Dataset, row: usize) -> Result<f64> {
            Ok(self.propensities[row])
        }
    }

    impl PropensityEstimator for StubEstimator {
        fn fit(
            &self,
            _data: &Dataset,
            _treatment: &str,
            _common_causes: &[String],
        ) -> Result<Box<dyn PropensityModel>> {
            Ok(Box::new(StubModel {
                propensities: self.propensities.clone(),
            }))
        }
    }

    fn identified() -> Identification {
        Identification {
            common_causes: vec!["z".to_string()],
            identified: true,
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_columns(vec![
            (
                "z".to_string(),
                vec![
                    Value::Float(0.1),
                    Value::Float(0.9),
                    Value::Float(0.5),
                    Value::Float(0.7),
                ],
            ),
            (
                "d".to_string(),
                vec![
                    Value::Bool(false),
                    Value::Bool(true),
                    Value::Bool(false),
                    Value::Bool(true),
                ],
            ),
            (
                "y".to_string(),
                vec![
                    Value::Float(1.0),
                    Value::Float(4.0),
                    Value::Float(2.0),
                    Value::Float(3.0),
                ],
            ),
        ])
        .unwrap()
    }

    fn sampler(propensities: Vec<f64>) -> WeightingSampler {
        WeightingSampler::new(
            "d",
            identified(),
            Box::new(StubEstimator { propensities }),
        )
    }

    #[test]
    fn unidentified_without_override_fails_at_fit() {
        let mut s = WeightingSampler::new(
            "d",
            Identification {
                common_causes: vec![],
                identified: false,
            },
            Box::new(StubEstimator {
                propensities: vec![],
            }),
        );
        let err = s.fit(&dataset()).unwrap_err();
        assert!(matches!(err, InterveneError::Identification { .. }));
    }

    #[test]
    fn disrupt_attaches_inverse_propensity_weights() {
        let mut s = sampler(vec![0.5, 0.25, 0.5, 0.8]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        let weights = frame.weights().unwrap();
        assert!((weights[1] - 4.0).abs() < 1e-12);
        assert!((weights[3] - 1.25).abs() < 1e-12);
    }

    #[test]
    fn degenerate_propensity_is_an_error_not_a_clip() {
        let mut s = sampler(vec![0.5, 1.0, 0.5, 0.5]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        let err = s.disrupt(&mut frame).unwrap_err();
        assert!(matches!(
            err,
            InterveneError::DegeneratePropensity { row: 1, .. }
        ));
    }

    #[test]
    fn configured_clip_tames_degenerate_scores() {
        let mut s = sampler(vec![0.5, 1.0, 0.0, 0.5]).with_clip(0.05);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        let weights = frame.weights().unwrap();
        assert!((weights[1] - 1.0 / 0.95).abs() < 1e-12);
        assert!((weights[2] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn keep_observed_leaves_the_frame_untouched() {
        let mut s = sampler(vec![0.5; 4]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.make_effective(&mut frame, &InterventionSpec::KeepObserved)
            .unwrap();
        assert_eq!(frame.data().column("d").unwrap(), dataset().column("d").unwrap());
        assert!(frame.eligible().is_none());
    }

    #[test]
    fn force_value_overwrites_and_restricts_support() {
        let mut s = sampler(vec![0.5; 4]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.make_effective(&mut frame, &InterventionSpec::force(Value::Bool(true)))
            .unwrap();
        assert_eq!(
            frame.data().column("d").unwrap(),
            &[
                Value::Bool(true),
                Value::Bool(true),
                Value::Bool(true),
                Value::Bool(true)
            ]
        );
        assert_eq!(frame.eligible().unwrap(), &[1, 3]);
    }

    #[test]
    fn unsupported_forced_value_fails_at_propagate() {
        let mut s = sampler(vec![0.5; 4]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        s.make_effective(&mut frame, &InterventionSpec::force(Value::Level(7)))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = s.propagate_and_sample(&frame, &mut rng).unwrap_err();
        assert!(matches!(err, InterveneError::EmptySupport { .. }));
    }

    #[test]
    fn empty_support_reports_every_unsupported_value() {
        let mut s = sampler(vec![0.5; 4]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        s.make_effective(
            &mut frame,
            &InterventionSpec::force_each(vec![
                Value::Level(7),
                Value::Level(8),
                Value::Level(7),
                Value::Level(8),
            ]),
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = s.propagate_and_sample(&frame, &mut rng).unwrap_err();
        match err {
            InterveneError::EmptySupport { value } => {
                assert!(value.contains('7') && value.contains('8'), "value = {value}");
            }
            other => panic!("expected EmptySupport, got {other:?}"),
        }
    }

    #[test]
    fn heavy_weights_dominate_the_resample() {
        // Row 1 carries weight 100, the rest 1: nearly every draw is row 1.
        let mut s = sampler(vec![1.0 / 1.0, 1.0 / 100.0, 1.0 / 1.0, 1.0 / 1.0])
            .with_clip(1e-6)
            .with_sample_size(500);
        // clip keeps 1.0 propensity legal for this synthetic setup
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        s.make_effective(&mut frame, &InterventionSpec::KeepObserved)
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let sample = s.propagate_and_sample(&frame, &mut rng).unwrap();
        let y = sample.numeric("y").unwrap();
        let share_row1 = y.iter().filter(|&&v| v == 4.0).count() as f64 / y.len() as f64;
        assert!(share_row1 > 0.9, "share = {share_row1}");
    }

    #[test]
    fn include_weights_appends_a_weight_column() {
        let mut s = sampler(vec![0.5; 4]).with_include_weights(true);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sample = s.propagate_and_sample(&frame, &mut rng).unwrap();
        let weights = sample.numeric("weight").unwrap();
        assert_eq!(weights.len(), 4);
        assert!(weights.iter().all(|&w| (w - 2.0).abs() < 1e-12));
    }

    #[test]
    fn sample_keeps_input_schema_and_row_count() {
        let mut s = sampler(vec![0.5; 4]);
        s.fit(&dataset()).unwrap();
        let mut frame = WorkingFrame::new(dataset());
        s.disrupt(&mut frame).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let sample = s.propagate_and_sample(&frame, &mut rng).unwrap();
        assert_eq!(sample.columns(), dataset().columns());
        assert_eq!(sample.n_rows(), 4);
    }
}
