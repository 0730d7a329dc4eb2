//! Return-ratio features over aligned price tables.

use crate::data::align::{reindex_weekdays, ReindexOptions};
use crate::data::schema::{
    column_values, date_column, frame_dates, series_values, value_columns, ADJ_CLOSE, DATE_COLUMN,
};
use crate::error::PipelineError;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Price tables keyed by ticker.
pub type TickerFrames = BTreeMap<String, DataFrame>;

/// Direction in which [`apply_to_dataframe`] slices a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Axis {
    /// Call the function once per value column.
    #[default]
    Columns,
    /// Call the function once per row of values.
    Rows,
}

/// `1 + pct_change` over `periods` rows.
///
/// `out[i] = 1 + (x[i] - x[i - periods]) / x[i - periods]`. The first
/// `periods` entries are null, as is any entry with a null operand. Zero
/// denominators give inf/NaN.
pub fn calculate_pct_returns(series: &Series, periods: usize) -> PolarsResult<Series> {
    let values = series_values(series)?;
    let ratios: Vec<Option<f64>> = (0..values.len())
        .map(|i| {
            if i < periods {
                return None;
            }
            match (values[i], values[i - periods]) {
                (Some(current), Some(previous)) => Some(1.0 + (current - previous) / previous),
                _ => None,
            }
        })
        .collect();
    Ok(Series::new(series.name().clone(), ratios))
}

/// Apply `func` to every value column (or every row) of `df`.
///
/// Column mode renames each output to its input column; the `Date` column is
/// kept when every output still has the table's height. Row mode gathers each
/// row's numeric values into a `Float64` series and expands the outputs into
/// columns. When the widths agree the input names and dtypes are restored;
/// otherwise the outputs are named `0..k`. Non-numeric columns are carried
/// through unchanged in both cases.
pub fn apply_to_dataframe<F>(
    df: &DataFrame,
    func: F,
    axis: Axis,
) -> Result<DataFrame, PipelineError>
where
    F: Fn(&Series) -> PolarsResult<Series>,
{
    let date = df.column(DATE_COLUMN).ok().cloned();

    match axis {
        Axis::Columns => {
            let mut outputs = Vec::new();
            for column in value_columns(df) {
                let out = func(column.as_materialized_series())?;
                outputs.push(Column::from(out.with_name(column.name().clone())));
            }

            let mut columns = Vec::with_capacity(outputs.len() + 1);
            if let Some(date) = date {
                if outputs.iter().all(|c| c.len() == df.height()) {
                    columns.push(date);
                }
            }
            columns.extend(outputs);
            Ok(DataFrame::new(columns)?)
        }
        Axis::Rows => {
            let numeric: Vec<&Column> = value_columns(df).filter(|c| is_numeric(c)).collect();
            let data = numeric
                .iter()
                .map(|c| column_values(c))
                .collect::<PolarsResult<Vec<_>>>()?;

            let mut width: Option<usize> = None;
            let mut rows: Vec<Vec<Option<f64>>> = Vec::with_capacity(df.height());
            for row in 0..df.height() {
                let cells: Vec<Option<f64>> = data.iter().map(|values| values[row]).collect();
                let out = series_values(&func(&Series::new(row.to_string().into(), cells))?)?;

                let expected = *width.get_or_insert(out.len());
                if out.len() != expected {
                    return Err(PipelineError::RaggedRows {
                        row,
                        expected,
                        found: out.len(),
                    });
                }
                rows.push(out);
            }
            let cell_column =
                |j: usize| -> Vec<Option<f64>> { rows.iter().map(|r| r[j]).collect() };

            let width = width.unwrap_or(numeric.len());
            let mut columns: Vec<Column> = date.into_iter().collect();
            if width == numeric.len() {
                // Same shape: rebuild in place with the input names and dtypes.
                let mut j = 0;
                for column in value_columns(df) {
                    if is_numeric(column) {
                        let rebuilt = Column::new(column.name().clone(), cell_column(j));
                        columns.push(rebuilt.cast(column.dtype())?);
                        j += 1;
                    } else {
                        columns.push(column.clone());
                    }
                }
            } else {
                columns.extend(value_columns(df).filter(|c| !is_numeric(c)).cloned());
                for j in 0..width {
                    columns.push(Column::new(j.to_string().into(), cell_column(j)));
                }
            }
            Ok(DataFrame::new(columns)?)
        }
    }
}

/// Integer and float columns take part in row-wise application; the rest
/// pass through untouched.
fn is_numeric(column: &Column) -> bool {
    let dtype = column.dtype();
    dtype.is_float() || dtype.is_integer()
}

/// Align every table and compute `periods`-lag return ratios of `Adj Close`.
///
/// Each table is reindexed in place onto weekdays from `start` through its
/// own last date, so callers that still need the raw tables must clone the
/// map first. The joint table spans the union of the aligned calendars.
pub fn transform_to_target(
    tickers_data: &mut TickerFrames,
    start: NaiveDate,
    periods: usize,
) -> Result<DataFrame, PipelineError> {
    let opts = ReindexOptions {
        start: Some(start),
        ..Default::default()
    };
    transform_with_options(tickers_data, &opts, periods)
}

/// [`transform_to_target`] with explicit alignment options.
pub fn transform_with_options(
    tickers_data: &mut TickerFrames,
    opts: &ReindexOptions,
    periods: usize,
) -> Result<DataFrame, PipelineError> {
    for frame in tickers_data.values_mut() {
        *frame = reindex_weekdays(frame, opts)?;
    }

    let joint = adjusted_close_table(tickers_data)?;
    tracing::debug!(
        rows = joint.height(),
        tickers = tickers_data.len(),
        periods,
        "built adjusted close table"
    );

    apply_to_dataframe(&joint, |s| calculate_pct_returns(s, periods), Axis::Columns)
}

/// One `Adj Close` column per ticker over the union of all table dates.
pub fn adjusted_close_table(tickers_data: &TickerFrames) -> Result<DataFrame, PipelineError> {
    let mut series: Vec<(&str, HashMap<NaiveDate, Option<f64>>)> = Vec::new();
    let mut all_dates = BTreeSet::new();

    for (ticker, frame) in tickers_data {
        let dates = frame_dates(frame)?;
        let adj = frame
            .column(ADJ_CLOSE)
            .map_err(|_| PipelineError::MissingTickerColumn {
                ticker: ticker.clone(),
                column: ADJ_CLOSE.to_string(),
            })?;
        let values = column_values(adj)?;

        all_dates.extend(dates.iter().copied());
        series.push((ticker.as_str(), dates.into_iter().zip(values).collect()));
    }

    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
    let mut columns = vec![date_column(&dates)?];
    for (ticker, by_date) in series {
        let values: Vec<Option<f64>> = dates
            .iter()
            .map(|d| by_date.get(d).copied().flatten())
            .collect();
        columns.push(Column::new(ticker.into(), values));
    }

    Ok(DataFrame::new(columns)?)
}
