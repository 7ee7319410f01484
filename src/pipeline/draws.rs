//! Batch draw runner.
//!
//! Pipeline flow:
//! JSONL rows → Dataset → SamplingSession → N interventional draws → JSONL
//!
//! Each line of the output is one complete draw, tagged with an id and a
//! timestamp so downstream variance estimation can aggregate over draws.

use crate::models::{Config, Dataset, DrawStats, InterveneError, Result, Value};
use crate::sampler::{InterventionSpec, WeightingSampler};
use crate::session::SamplingSession;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// One interventional draw, as written to the output file.
#[derive(Debug, Serialize, Deserialize)]
pub struct DrawRecord {
    /// Unique identifier for this draw
    pub id: String,

    /// When the draw was produced
    pub drawn_at: DateTime<Utc>,

    /// RNG seed of the session that produced it, when one was configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Rows of the sampled dataset
    pub rows: Vec<BTreeMap<String, Value>>,
}

/// Runs batches of interventional draws against a dataset.
pub struct DrawRunner {
    config: Config,
}

impl DrawRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Load a dataset from a JSONL file (one JSON object per row).
    pub fn load_dataset(path: &Path) -> Result<Dataset> {
        let file = File::open(path).map_err(|e| InterveneError::io("opening dataset file", e))?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| InterveneError::io("reading dataset file", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: BTreeMap<String, Value> = serde_json::from_str(&line)
                .map_err(|e| InterveneError::Parse(format!("Line {}: {}", line_num + 1, e)))?;
            records.push(record);
        }

        let dataset = Dataset::from_records(records)?;
        info!(
            rows = dataset.n_rows(),
            columns = dataset.columns().len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Draw `config.sampling.draws` interventional datasets and write them
    /// as JSONL to `output_path`.
    pub fn run(
        &self,
        data: Dataset,
        intervention: Option<InterventionSpec>,
        output_path: &Path,
    ) -> Result<DrawStats> {
        let start = Instant::now();
        let draws = self.config.sampling.draws;
        let treatment = &self.config.variables.treatment;
        let outcome = &self.config.variables.outcome;

        info!(
            draws,
            rows = data.n_rows(),
            treatment = %treatment,
            stateful = self.config.sampling.stateful,
            "Starting draw run"
        );

        let naive_contrast = data.treatment_contrast(treatment, outcome).ok();

        let mut session = SamplingSession::new(
            data,
            Box::new(WeightingSampler::from_config(&self.config)),
            &self.config.sampling,
        );

        let pb = ProgressBar::new(draws as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .map_err(|e| InterveneError::Internal(e.to_string()))?
                .progress_chars("##-"),
        );

        let output_file = File::create(output_path)
            .map_err(|e| InterveneError::io("creating output file", e))?;
        let mut writer = BufWriter::new(output_file);

        let mut stats = DrawStats {
            total_draws: 0,
            naive_contrast,
            ..Default::default()
        };
        let mut contrast_sum = 0.0;
        let mut contrast_count = 0usize;

        for _ in 0..draws {
            let sample = session.sample(intervention.clone())?;
            stats.rows_per_draw = sample.n_rows();

            if let Ok(contrast) = sample.treatment_contrast(treatment, outcome) {
                contrast_sum += contrast;
                contrast_count += 1;
            }

            let record = DrawRecord {
                id: Uuid::new_v4().to_string(),
                drawn_at: Utc::now(),
                seed: self.config.sampling.seed,
                rows: sample.records(),
            };
            let json = serde_json::to_string(&record).map_err(|e| {
                InterveneError::Internal(format!("Failed to serialize draw: {}", e))
            })?;
            writeln!(writer, "{}", json).map_err(|e| InterveneError::io("writing output", e))?;

            stats.total_draws += 1;
            pb.inc(1);
            pb.set_message(format!("draws: {}", stats.total_draws));
        }

        writer
            .flush()
            .map_err(|e| InterveneError::io("flushing output", e))?;
        pb.finish_with_message(format!("Done! {} draws", stats.total_draws));

        if let Some(summary) = session.weight_summary() {
            stats.weight_mean = summary.mean;
            stats.weight_min = summary.min;
            stats.weight_max = summary.max;
            stats.effective_sample_size = summary.effective_sample_size;
        }
        if contrast_count > 0 {
            stats.weighted_contrast = Some(contrast_sum / contrast_count as f64);
        }
        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();

        info!(
            draws = stats.total_draws,
            rows_per_draw = stats.rows_per_draw,
            ess = format!("{:.1}", stats.effective_sample_size),
            naive = stats.naive_contrast.map(|c| format!("{:.4}", c)),
            weighted = stats.weighted_contrast.map(|c| format!("{:.4}", c)),
            throughput = format!("{:.0}/hr", stats.draws_per_hour),
            "Draw run complete"
        );

        Ok(stats)
    }
}
