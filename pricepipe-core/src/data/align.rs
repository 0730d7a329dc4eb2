//! Calendar alignment.
//!
//! Reindexes one price table onto a regular calendar. Dates the table does not
//! cover become rows of nulls; by default they stay null (no forward-fill of
//! price data unless a fill method is configured).

use super::schema::{column_values, date_column, frame_dates, is_missing, value_columns};
use crate::calendar::{date_range, is_weekend, Frequency};
use crate::error::PipelineError;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// How to fill gaps introduced by reindexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMethod {
    /// Propagate the last observation forward.
    #[serde(rename = "ffill")]
    Forward,
    /// Propagate the next observation backward.
    #[serde(rename = "bfill")]
    Backward,
}

impl FillMethod {
    /// Fill null/NaN entries in place. Leading (forward) or trailing
    /// (backward) gaps have nothing to copy and stay missing.
    pub fn apply(self, values: &mut [Option<f64>]) {
        let mut carry: Option<f64> = None;
        let mut fill_one = |slot: &mut Option<f64>| {
            if is_missing(*slot) {
                if carry.is_some() {
                    *slot = carry;
                }
            } else {
                carry = *slot;
            }
        };

        match self {
            Self::Forward => values.iter_mut().for_each(&mut fill_one),
            Self::Backward => values.iter_mut().rev().for_each(&mut fill_one),
        }
    }
}

impl FromStr for FillMethod {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ffill" | "pad" | "forward" => Ok(Self::Forward),
            "bfill" | "backfill" | "backward" => Ok(Self::Backward),
            other => Err(PipelineError::InvalidFillMethod {
                value: other.to_owned(),
            }),
        }
    }
}

/// Options for [`reindex_weekdays`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReindexOptions {
    /// Remove Saturday and Sunday rows after reindexing.
    pub drop_weekends: bool,
    /// First calendar date. Defaults to the table's first date.
    pub start: Option<NaiveDate>,
    /// Last calendar date. Defaults to the table's last date.
    pub end: Option<NaiveDate>,
    /// Gap fill applied after reindexing. `None` leaves gaps as nulls.
    pub fill: Option<FillMethod>,
    /// Second fill pass, only run after `fill`.
    pub extra_fill: Option<FillMethod>,
    pub freq: Frequency,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            drop_weekends: true,
            start: None,
            end: None,
            fill: None,
            extra_fill: Some(FillMethod::Backward),
            freq: Frequency::Daily,
        }
    }
}

/// Reindex a price table onto a regular calendar.
///
/// The calendar runs from the resolved start to the resolved end (inclusive)
/// at `opts.freq`. Each calendar date takes the table's row for that date, or
/// a row of nulls when the table has none; rows outside the calendar are
/// dropped. Weekend rows are removed last, after any fill, so unfilled weekday
/// gaps remain in the output.
pub fn reindex_weekdays(
    df: &DataFrame,
    opts: &ReindexOptions,
) -> Result<DataFrame, PipelineError> {
    let dates = frame_dates(df)?;

    let start = match opts.start {
        Some(start) => start,
        None => *dates.first().ok_or(PipelineError::EmptyTable)?,
    };
    let end = match opts.end {
        Some(end) => end,
        None => *dates.last().ok_or(PipelineError::EmptyTable)?,
    };

    // Build a lookup: date → row
    let mut row_of: HashMap<NaiveDate, usize> = HashMap::with_capacity(dates.len());
    for (row, date) in dates.iter().enumerate() {
        if row_of.insert(*date, row).is_some() {
            return Err(PipelineError::DuplicateDate(*date));
        }
    }

    let calendar = date_range(start, end, opts.freq);
    let source_rows: Vec<Option<usize>> =
        calendar.iter().map(|d| row_of.get(d).copied()).collect();
    let keep: Vec<bool> = calendar
        .iter()
        .map(|d| !(opts.drop_weekends && is_weekend(*d)))
        .collect();

    let kept_dates: Vec<NaiveDate> = calendar
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(d, _)| *d)
        .collect();

    let mut columns = vec![date_column(&kept_dates)?];
    for column in value_columns(df) {
        let values = column_values(column)?;
        let mut aligned: Vec<Option<f64>> = source_rows
            .iter()
            .map(|row| row.and_then(|r| values[r]))
            .collect();

        if let Some(fill) = opts.fill {
            fill.apply(&mut aligned);
            if let Some(extra) = opts.extra_fill {
                extra.apply(&mut aligned);
            }
        }

        let kept: Vec<Option<f64>> = aligned
            .into_iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(v, _)| v)
            .collect();
        columns.push(Column::new(column.name().clone(), kept));
    }

    tracing::debug!(
        input_rows = df.height(),
        output_rows = kept_dates.len(),
        %start,
        %end,
        freq = %opts.freq,
        "reindexed table"
    );

    Ok(DataFrame::new(columns)?)
}
