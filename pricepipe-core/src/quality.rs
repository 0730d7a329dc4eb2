//! Missing-data report per column.

use crate::data::schema::{column_values, is_missing, value_columns};
use crate::error::PipelineError;
use polars::prelude::*;
use serde::Serialize;

/// Share of missing entries in one column, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnQuality {
    pub column: String,
    pub missing_pct: f64,
}

/// Percentage of missing (null or NaN) entries in each value column.
///
/// Computed as `100 - 100 * (rows - missing) / rows`; a table without rows
/// yields NaN.
pub fn calculate_na_per_column(df: &DataFrame) -> Result<Vec<ColumnQuality>, PipelineError> {
    let rows = df.height() as f64;

    value_columns(df)
        .map(|column| -> Result<ColumnQuality, PipelineError> {
            let missing = missing_count(column)? as f64;
            Ok(ColumnQuality {
                column: column.name().to_string(),
                missing_pct: 100.0 - (100.0 * (rows - missing) / rows),
            })
        })
        .collect()
}

fn missing_count(column: &Column) -> PolarsResult<usize> {
    if column.dtype().is_float() {
        Ok(column_values(column)?
            .into_iter()
            .filter(|v| is_missing(*v))
            .count())
    } else {
        Ok(column.null_count())
    }
}
