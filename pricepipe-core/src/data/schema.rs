//! Column conventions for price tables.
//!
//! A price table is a polars `DataFrame` whose `Date` column (`DataType::Date`)
//! plays the role of the row index. Every other column is a value column and
//! is read as `Float64`.

use crate::error::PipelineError;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;

/// Name of the date index column.
pub const DATE_COLUMN: &str = "Date";

/// Price field adjusted for splits and dividends; the canonical return series.
pub const ADJ_CLOSE: &str = "Adj Close";

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Build the `Date` index column from calendar dates.
pub fn date_column(dates: &[NaiveDate]) -> PolarsResult<Column> {
    let epoch = epoch();
    let days: Vec<i32> = dates
        .iter()
        .map(|d| (*d - epoch).num_days() as i32)
        .collect();
    Column::new(DATE_COLUMN.into(), days).cast(&DataType::Date)
}

/// Read the `Date` index column back into calendar dates.
pub fn frame_dates(df: &DataFrame) -> Result<Vec<NaiveDate>, PipelineError> {
    let column = df
        .column(DATE_COLUMN)
        .map_err(|_| PipelineError::MissingColumn(DATE_COLUMN.to_string()))?;
    let date_ca = column.date()?;
    let epoch = epoch();

    (0..date_ca.len())
        .map(|row| {
            date_ca
                .get(row)
                .map(|days| epoch + Duration::days(days as i64))
                .ok_or(PipelineError::NullDate { row })
        })
        .collect()
}

/// Every column except the date index, in table order.
pub fn value_columns(df: &DataFrame) -> impl Iterator<Item = &Column> {
    df.get_columns()
        .iter()
        .filter(|c| c.name().as_str() != DATE_COLUMN)
}

pub fn series_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}

pub fn column_values(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    series_values(column.as_materialized_series())
}

/// Null or NaN: both count as a missing observation.
pub fn is_missing(value: Option<f64>) -> bool {
    value.map_or(true, f64::is_nan)
}
