//! Intervention specification for stage 2 of the pipeline.

use crate::models::{InterveneError, Result, Value};
use serde::{Deserialize, Serialize};

/// What stage 2 (`make_effective`) should do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterventionSpec {
    /// Leave the observed treatment assignment untouched; the disruption
    /// weights already account for confounding.
    KeepObserved,

    /// Force the treatment column to the given value(s): a single value is
    /// broadcast to every row, otherwise one value per row is required.
    ForceValue { values: Vec<Value> },
}

impl InterventionSpec {
    /// Force every row to one literal value.
    pub fn force(value: Value) -> Self {
        Self::ForceValue {
            values: vec![value],
        }
    }

    /// Force each row to its own value.
    pub fn force_each(values: Vec<Value>) -> Self {
        Self::ForceValue { values }
    }

    /// Check the value count against the frame's row count.
    pub fn validate(&self, n_rows: usize) -> Result<()> {
        match self {
            Self::KeepObserved => Ok(()),
            Self::ForceValue { values } => {
                if values.len() == 1 || values.len() == n_rows {
                    Ok(())
                } else {
                    Err(InterveneError::InterventionLength {
                        expected: n_rows,
                        got: values.len(),
                    })
                }
            }
        }
    }

    /// Forced value for a row, after `validate` has passed.
    /// `None` for `KeepObserved`.
    pub fn value_for_row(&self, row: usize) -> Option<Value> {
        match self {
            Self::KeepObserved => None,
            Self::ForceValue { values } => {
                if values.len() == 1 {
                    Some(values[0])
                } else {
                    values.get(row).copied()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn broadcast_and_exact_lengths_validate() {
        assert!(InterventionSpec::force(Value::Bool(true)).validate(10).is_ok());
        let each = InterventionSpec::force_each(vec![Value::Bool(true); 10]);
        assert!(each.validate(10).is_ok());
        assert!(InterventionSpec::KeepObserved.validate(0).is_ok());
    }

    #[test]
    fn scalar_broadcasts_to_every_row() {
        let spec = InterventionSpec::force(Value::Level(2));
        assert_eq!(spec.value_for_row(0), Some(Value::Level(2)));
        assert_eq!(spec.value_for_row(999), Some(Value::Level(2)));
    }

    proptest! {
        #[test]
        fn mismatched_lengths_are_rejected(len in 2usize..50, n_rows in 51usize..200) {
            let spec = InterventionSpec::force_each(vec![Value::Bool(false); len]);
            let err = spec.validate(n_rows).unwrap_err();
            prop_assert!(matches!(
                err,
                crate::models::InterveneError::InterventionLength { expected, got }
                    if expected == n_rows && got == len
            ), "unexpected error: lengths {} vs {}", n_rows, len);
        }
    }
}
