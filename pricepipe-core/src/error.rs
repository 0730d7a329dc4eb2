//! Errors raised by the alignment and transformation stages.
//!
//! Unlike fetch failures (see [`crate::data::DataError`]), these are never
//! recovered: they abort the whole call and surface to the caller unchanged.

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("table for '{ticker}' has no '{column}' column")]
    MissingTickerColumn { ticker: String, column: String },

    #[error("cannot infer calendar bounds from an empty table")]
    EmptyTable,

    #[error("null date at row {row}")]
    NullDate { row: usize },

    #[error("cannot reindex: duplicate date {0}")]
    DuplicateDate(NaiveDate),

    #[error("row {row} produced {found} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid frequency '{value}', expected one of D, B, W")]
    InvalidFrequency { value: String },

    #[error("invalid fill method '{value}', expected ffill or bfill")]
    InvalidFillMethod { value: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}
