//! User-facing sampling session.
//!
//! A session owns the original dataset, a do-sampler strategy, and the RNG.
//! The stateful/stateless duality is an explicit execution-mode flag: both
//! paths share the same pipeline, differing only in whether the working
//! frame and fitted model are retained across calls.
//!
//! A session is single-threaded by design; run independent sessions in
//! parallel to bootstrap many draws.

use crate::models::{Dataset, InterveneError, Result, SamplingConfig};
use crate::sampler::{DoSampler, InterventionSpec, WeightSummary, WorkingFrame};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Stateful/stateless orchestration wrapper around a [`DoSampler`].
pub struct SamplingSession {
    sampler: Box<dyn DoSampler>,
    original: Dataset,
    /// Retained working frame; populated only in stateful mode
    frame: Option<WorkingFrame>,
    stateful: bool,
    keep_original_treatment: bool,
    rng: ChaCha8Rng,
    fit_count: usize,
    last_weight_summary: Option<WeightSummary>,
}

impl SamplingSession {
    pub fn new(original: Dataset, sampler: Box<dyn DoSampler>, config: &SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            sampler,
            original,
            frame: None,
            stateful: config.stateful,
            keep_original_treatment: config.keep_original_treatment,
            rng,
            fit_count: 0,
            last_weight_summary: None,
        }
    }

    /// Produce one draw from the interventional distribution.
    ///
    /// `intervention` must be `None` exactly when `keep_original_treatment`
    /// is set; otherwise it is required, and its absence fails before any
    /// model fitting happens.
    pub fn sample(&mut self, intervention: Option<InterventionSpec>) -> Result<Dataset> {
        let spec = if self.keep_original_treatment {
            if intervention.is_some() {
                debug!("supplied intervention ignored: keep_original_treatment is set");
            }
            InterventionSpec::KeepObserved
        } else {
            intervention.ok_or(InterveneError::MissingIntervention)?
        };

        if self.stateful {
            if !self.sampler.is_fitted() {
                self.sampler.fit(&self.original)?;
                self.fit_count += 1;
                info!(fit = self.fit_count, "fitted sampler for stateful session");
            }
            if self.frame.is_none() {
                self.frame = Some(WorkingFrame::new(self.original.clone()));
            }
            let frame = self
                .frame
                .as_mut()
                .ok_or_else(|| InterveneError::Internal("retained frame missing".into()))?;
            // The fitted model never changes mid-session, so the weights
            // from the first disruption stay valid.
            if frame.weights().is_none() {
                self.sampler.disrupt(frame)?;
            }
            self.last_weight_summary = frame.weights().and_then(WeightSummary::from_weights);
            self.sampler.make_effective(frame, &spec)?;
            self.sampler.propagate_and_sample(frame, &mut self.rng)
        } else {
            self.sampler.reset();
            self.sampler.fit(&self.original)?;
            self.fit_count += 1;
            let mut frame = WorkingFrame::new(self.original.clone());
            self.sampler.disrupt(&mut frame)?;
            self.last_weight_summary = frame.weights().and_then(WeightSummary::from_weights);
            self.sampler.make_effective(&mut frame, &spec)?;
            self.sampler.propagate_and_sample(&frame, &mut self.rng)
        }
    }

    /// Discard the retained frame and fitted model; the next `sample`
    /// refits from the original dataset. No-op in stateless mode, where no
    /// state accumulates.
    pub fn reset(&mut self) {
        self.frame = None;
        self.sampler.reset();
        self.last_weight_summary = None;
        debug!("session reset");
    }

    /// How many times the underlying sampler has been fitted.
    pub fn fit_count(&self) -> usize {
        self.fit_count
    }

    /// Diagnostics for the most recent disruption.
    pub fn weight_summary(&self) -> Option<WeightSummary> {
        self.last_weight_summary
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    /// The immutable input dataset.
    pub fn original(&self) -> &Dataset {
        &self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EstimatorConfig, Identification, Value};
    use crate::propensity::{LogisticEstimator, PropensityEstimator, PropensityModel};
    use crate::sampler::WeightingSampler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Wraps the logistic estimator and counts fit calls.
    struct CountingEstimator {
        inner: LogisticEstimator,
        fits: Arc<AtomicUsize>,
    }

    impl PropensityEstimator for CountingEstimator {
        fn fit(
            &self,
            data: &Dataset,
            treatment: &str,
            common_causes: &[String],
        ) -> Result<Box<dyn PropensityModel>> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            self.inner.fit(data, treatment, common_causes)
        }
    }

    fn dataset(n: usize) -> Dataset {
        let z: Vec<Value> = (0..n).map(|i| Value::Float(i as f64 / n as f64)).collect();
        let d: Vec<Value> = (0..n)
            .map(|i| Value::Bool((i * 7 + i / 3) % 3 == 0 || i as f64 / n as f64 > 0.6))
            .collect();
        let y: Vec<Value> = (0..n)
            .map(|i| Value::Float(i as f64 / n as f64 * 2.0))
            .collect();
        Dataset::from_columns(vec![
            ("z".to_string(), z),
            ("d".to_string(), d),
            ("y".to_string(), y),
        ])
        .unwrap()
    }

    fn session(stateful: bool, keep: bool, seed: u64, fits: Arc<AtomicUsize>) -> SamplingSession {
        let sampler = WeightingSampler::new(
            "d",
            Identification {
                common_causes: vec!["z".to_string()],
                identified: true,
            },
            Box::new(CountingEstimator {
                inner: LogisticEstimator::new(EstimatorConfig::default()),
                fits,
            }),
        );
        let config = SamplingConfig {
            stateful,
            keep_original_treatment: keep,
            seed: Some(seed),
            ..Default::default()
        };
        SamplingSession::new(dataset(60), Box::new(sampler), &config)
    }

    #[test]
    fn missing_intervention_fails_before_any_fit() {
        let fits = Arc::new(AtomicUsize::new(0));
        let mut s = session(false, false, 1, Arc::clone(&fits));
        let err = s.sample(None).unwrap_err();
        assert!(matches!(err, InterveneError::MissingIntervention));
        assert_eq!(fits.load(Ordering::SeqCst), 0);
        assert_eq!(s.fit_count(), 0);
    }

    #[test]
    fn stateful_session_fits_exactly_once() {
        let fits = Arc::new(AtomicUsize::new(0));
        let mut s = session(true, true, 2, Arc::clone(&fits));
        for _ in 0..3 {
            s.sample(None).unwrap();
        }
        assert_eq!(fits.load(Ordering::SeqCst), 1);
        assert_eq!(s.fit_count(), 1);
    }

    #[test]
    fn stateless_session_fits_once_per_call() {
        let fits = Arc::new(AtomicUsize::new(0));
        let mut s = session(false, true, 3, Arc::clone(&fits));
        for _ in 0..3 {
            s.sample(None).unwrap();
        }
        assert_eq!(fits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reset_forces_a_refit() {
        let fits = Arc::new(AtomicUsize::new(0));
        let mut s = session(true, true, 4, Arc::clone(&fits));
        s.sample(None).unwrap();
        s.reset();
        s.sample(None).unwrap();
        assert_eq!(fits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn keep_original_treatment_ignores_a_supplied_intervention() {
        // Same seed, one call with None, one with a forced value: the
        // intervention must be ignored, so the draws are identical.
        let fits = Arc::new(AtomicUsize::new(0));
        let mut a = session(false, true, 5, Arc::clone(&fits));
        let mut b = session(false, true, 5, Arc::clone(&fits));
        let left = a.sample(None).unwrap();
        let right = b
            .sample(Some(InterventionSpec::force(Value::Bool(true))))
            .unwrap();
        assert_eq!(left.records(), right.records());
    }

    #[test]
    fn weight_summary_is_available_after_a_draw() {
        let fits = Arc::new(AtomicUsize::new(0));
        let mut s = session(false, true, 6, fits);
        assert!(s.weight_summary().is_none());
        s.sample(None).unwrap();
        let summary = s.weight_summary().unwrap();
        assert!(summary.mean >= 1.0);
        assert!(summary.effective_sample_size > 0.0);
    }
}
