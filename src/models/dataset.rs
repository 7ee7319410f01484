//! Tabular data model for intervene.
//!
//! A [`Dataset`] is an ordered collection of rows over a fixed schema; every
//! cell is a [`Value`] typed as binary, categorical, or continuous. The
//! sampling pipeline never mutates the original dataset it was given; each
//! draw works against an internal copy.

use crate::models::{InterveneError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A single cell value.
///
/// JSON form is the bare scalar: `true`, `3`, `0.25`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Binary variable
    Bool(bool),
    /// Categorical level
    Level(i64),
    /// Continuous measurement
    Float(f64),
}

impl Value {
    /// The column type this value belongs to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Bool(_) => ColumnType::Binary,
            Value::Level(_) => ColumnType::Categorical,
            Value::Float(_) => ColumnType::Continuous,
        }
    }

    /// Numeric encoding used by the propensity model (false=0, true=1).
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Level(l) => *l as f64,
            Value::Float(f) => *f,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Level(l) => write!(f, "{l}"),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Binary,
    Categorical,
    Continuous,
}

/// Causal role of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    /// The variable being intervened on
    Treatment,
    /// The downstream variable of interest
    Outcome,
    /// Affects both treatment and outcome; must be adjusted for
    CommonCause,
    /// Affects treatment only (unused by the weighting strategy)
    Instrument,
    /// Plays no role in the causal query
    Unrelated,
}

/// Identified estimand, produced by an external identification step.
///
/// The sampler treats this as opaque input: it never re-derives which
/// columns satisfy the backdoor criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identification {
    /// Columns determined to block all backdoor paths
    pub common_causes: Vec<String>,

    /// Whether the effect is identified from observed data.
    /// False means unobserved confounding; sampling then requires an
    /// explicit override.
    pub identified: bool,
}

/// An ordered, column-typed table of observations.
///
/// Invariant: every column has the same length, fixed at construction.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    data: HashMap<String, Vec<Value>>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from row records, enforcing a uniform schema.
    ///
    /// The schema is taken from the first record; any record missing a
    /// column or carrying an extra one is a contract violation.
    pub fn from_records(records: Vec<BTreeMap<String, Value>>) -> Result<Self> {
        let first = records.first().ok_or_else(|| {
            InterveneError::Parse("dataset must contain at least one row".to_string())
        })?;

        let columns: Vec<String> = first.keys().cloned().collect();
        let mut data: HashMap<String, Vec<Value>> = columns
            .iter()
            .map(|c| (c.clone(), Vec::with_capacity(records.len())))
            .collect();

        for (row_idx, record) in records.iter().enumerate() {
            if record.len() != columns.len() {
                return Err(InterveneError::Parse(format!(
                    "row {} has {} columns, expected {}",
                    row_idx,
                    record.len(),
                    columns.len()
                )));
            }
            for column in &columns {
                let value = record.get(column).ok_or_else(|| {
                    InterveneError::Parse(format!("row {row_idx} is missing column '{column}'"))
                })?;
                data.get_mut(column)
                    .ok_or_else(|| {
                        InterveneError::Internal(format!("missing column vec '{column}'"))
                    })?
                    .push(*value);
            }
        }

        Ok(Self {
            columns,
            data,
            n_rows: records.len(),
        })
    }

    /// Build a dataset directly from named columns.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let n_rows = columns
            .first()
            .map(|(_, v)| v.len())
            .ok_or_else(|| InterveneError::Parse("dataset must have at least one column".into()))?;

        let mut names = Vec::with_capacity(columns.len());
        let mut data = HashMap::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != n_rows {
                return Err(InterveneError::Parse(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    n_rows
                )));
            }
            names.push(name.clone());
            data.insert(name, values);
        }

        Ok(Self {
            columns: names,
            data,
            n_rows,
        })
    }

    /// Column names in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Values of a column.
    pub fn column(&self, name: &str) -> Result<&[Value]> {
        self.data
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| InterveneError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    /// Replace the values of an existing column.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(InterveneError::Internal(format!(
                "replacement for '{}' has {} rows, expected {}",
                name,
                values.len(),
                self.n_rows
            )));
        }
        match self.data.get_mut(name) {
            Some(existing) => {
                *existing = values;
                Ok(())
            }
            None => Err(InterveneError::ColumnNotFound {
                column: name.to_string(),
            }),
        }
    }

    /// Append a new column (used to expose weights on request).
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(InterveneError::Internal(format!(
                "new column '{}' has {} rows, expected {}",
                name,
                values.len(),
                self.n_rows
            )));
        }
        if self.data.contains_key(&name) {
            return Err(InterveneError::Internal(format!(
                "column '{name}' already exists"
            )));
        }
        self.columns.push(name.clone());
        self.data.insert(name, values);
        Ok(())
    }

    /// Numeric encoding of a column, for model fitting.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.column(name)?.iter().map(Value::as_f64).collect())
    }

    /// Declared or inferred type of a column (from its first value).
    pub fn column_type(&self, name: &str) -> Result<ColumnType> {
        self.column(name)?
            .first()
            .map(Value::column_type)
            .ok_or_else(|| InterveneError::Parse(format!("column '{name}' has no rows")))
    }

    /// New dataset containing the given rows, in order (duplicates allowed).
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let mut data = HashMap::with_capacity(self.columns.len());
        for column in &self.columns {
            let source = &self.data[column];
            let mut values = Vec::with_capacity(indices.len());
            for &i in indices {
                let value = source.get(i).ok_or_else(|| {
                    InterveneError::Internal(format!(
                        "row index {} out of bounds ({} rows)",
                        i, self.n_rows
                    ))
                })?;
                values.push(*value);
            }
            data.insert(column.clone(), values);
        }
        Ok(Self {
            columns: self.columns.clone(),
            data,
            n_rows: indices.len(),
        })
    }

    /// Row records in schema order, for serialization.
    pub fn records(&self) -> Vec<BTreeMap<String, Value>> {
        (0..self.n_rows)
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| (c.clone(), self.data[c][i]))
                    .collect()
            })
            .collect()
    }

    /// Distinct values of a column, in order of first appearance.
    pub fn support(&self, name: &str) -> Result<Vec<Value>> {
        let mut seen: Vec<Value> = Vec::new();
        for value in self.column(name)? {
            if !seen.contains(value) {
                seen.push(*value);
            }
        }
        Ok(seen)
    }

    /// Difference of outcome means between the two observed treatment levels:
    /// `mean(Y | D = high) - mean(Y | D = low)`.
    ///
    /// Requires exactly two observed treatment levels; the "high" level is
    /// the numerically larger one, so a bool treatment yields the familiar
    /// treated-minus-control contrast.
    pub fn treatment_contrast(&self, treatment: &str, outcome: &str) -> Result<f64> {
        let levels = self.support(treatment)?;
        if levels.len() != 2 {
            return Err(InterveneError::ModelFit {
                column: treatment.to_string(),
                reason: format!("contrast needs exactly 2 levels, found {}", levels.len()),
            });
        }
        let (low, high) = if levels[0].as_f64() <= levels[1].as_f64() {
            (levels[0], levels[1])
        } else {
            (levels[1], levels[0])
        };

        let t = self.column(treatment)?;
        let y = self.numeric(outcome)?;
        let mut sum_high = 0.0;
        let mut n_high = 0usize;
        let mut sum_low = 0.0;
        let mut n_low = 0usize;
        for (ti, yi) in t.iter().zip(&y) {
            if *ti == high {
                sum_high += yi;
                n_high += 1;
            } else if *ti == low {
                sum_low += yi;
                n_low += 1;
            }
        }
        if n_high == 0 || n_low == 0 {
            return Err(InterveneError::ModelFit {
                column: treatment.to_string(),
                reason: "one treatment level has no observations".to_string(),
            });
        }
        Ok(sum_high / n_high as f64 - sum_low / n_low as f64)
    }
}

/// Statistics for a batch of interventional draws.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawStats {
    /// Draws completed
    pub total_draws: usize,

    /// Rows per draw
    pub rows_per_draw: usize,

    /// Mean inverse-propensity weight over the working frame
    pub weight_mean: f64,

    /// Smallest weight
    pub weight_min: f64,

    /// Largest weight
    pub weight_max: f64,

    /// Kish effective sample size, `(Σw)² / Σw²`
    pub effective_sample_size: f64,

    /// Naive treatment-outcome contrast of the input data (binary treatment only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naive_contrast: Option<f64>,

    /// Mean contrast over the weighted draws (binary treatment only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_contrast: Option<f64>,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Draws per hour throughput
    pub draws_per_hour: f64,
}

impl DrawStats {
    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.draws_per_hour = self.total_draws as f64 / self.runtime_secs * 3600.0;
        }
    }
}
