// src/error.rs

use serde::Serialize;
use thiserror::Error;

/// Everything that can go wrong while cleaning and loading reviews.
///
/// `UnparseableDate`, `OutOfRangeValue` and `InvalidNumber` are per-row:
/// the row is skipped (or flagged) and the run carries on. The rest abort.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewError {
    #[error("unparseable date {value:?}")]
    UnparseableDate { value: String },

    #[error("{column} value {value} is outside [{min}, {max}]")]
    OutOfRangeValue {
        column: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{column} value {value:?} is not a valid number")]
    InvalidNumber { column: String, value: String },

    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 { field: usize },

    #[error("required column {column:?} missing from input")]
    MissingColumn { column: String },

    #[error("replacing table {table:?} failed: {reason}")]
    StoreWriteFailure { table: String, reason: String },
}

impl ReviewError {
    /// Row-level errors never abort a run.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ReviewError::UnparseableDate { .. }
                | ReviewError::OutOfRangeValue { .. }
                | ReviewError::InvalidNumber { .. }
                | ReviewError::InvalidUtf8 { .. }
        )
    }
}
