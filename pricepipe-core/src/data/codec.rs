//! CSV codec for price tables.
//!
//! Reads the provider's download format (first column a date, remaining
//! columns numeric, `null` or an empty field for missing values) and writes
//! tables back in the same shape, one `{ticker}_{interval}.csv` per ticker.

use super::download::local_epoch_seconds;
use super::interval::Interval;
use super::provider::{DataError, DataSource, FetchResult, PriceProvider};
use super::schema::{column_values, date_column, frame_dates, value_columns, DATE_COLUMN};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Parse a CSV body into a price table.
///
/// The first column becomes the `Date` column whatever its header says.
pub fn parse_price_csv(body: &[u8]) -> Result<DataFrame, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("unreadable header: {e}")))?
        .clone();
    if headers.len() < 2 {
        return Err(DataError::ResponseFormatChanged(format!(
            "expected a date column and at least one value column, got {} column(s)",
            headers.len()
        )));
    }

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len() - 1];

    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| DataError::ResponseFormatChanged(format!("malformed row {line}: {e}")))?;

        dates.push(parse_date(record.get(0).unwrap_or_default(), line)?);
        for (j, column) in values.iter_mut().enumerate() {
            let raw = record.get(j + 1).unwrap_or_default();
            column.push(parse_value(raw, &headers[j + 1], line)?);
        }
    }

    let mut columns =
        vec![date_column(&dates).map_err(|e| DataError::Frame(format!("date cast: {e}")))?];
    for (name, column) in headers.iter().skip(1).zip(values) {
        columns.push(Column::new(name.into(), column));
    }

    DataFrame::new(columns).map_err(|e| DataError::Frame(format!("dataframe creation: {e}")))
}

fn parse_date(raw: &str, line: usize) -> Result<NaiveDate, DataError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| {
            DataError::ResponseFormatChanged(format!("invalid date '{raw}' in row {line}"))
        })
}

fn parse_value(raw: &str, column: &str, line: usize) -> Result<Option<f64>, DataError> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>().map(Some).map_err(|_| {
        DataError::ResponseFormatChanged(format!(
            "invalid number '{raw}' in column '{column}', row {line}"
        ))
    })
}

/// Write a price table as CSV with the `Date` column first.
///
/// Missing values are written as empty fields.
pub fn write_frame_csv(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let io_err = |e: &dyn std::fmt::Display| DataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let dates = frame_dates(df).map_err(|e| DataError::Frame(e.to_string()))?;
    let columns: Vec<&Column> = value_columns(df).collect();
    let data = columns
        .iter()
        .map(|c| column_values(c))
        .collect::<PolarsResult<Vec<_>>>()
        .map_err(|e| DataError::Frame(format!("column read: {e}")))?;

    let mut wtr = csv::Writer::from_path(path).map_err(|e| io_err(&e))?;

    let mut header = vec![DATE_COLUMN.to_string()];
    header.extend(columns.iter().map(|c| c.name().to_string()));
    wtr.write_record(&header).map_err(|e| io_err(&e))?;

    for (row, date) in dates.iter().enumerate() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(
            data.iter()
                .map(|values| values[row].map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record).map_err(|e| io_err(&e))?;
    }

    wtr.flush().map_err(|e| io_err(&e))
}

/// Path of the saved file for a ticker: `{directory}/{ticker}_{interval}.csv`.
pub fn frame_path(directory: &Path, ticker: &str, interval: Interval) -> PathBuf {
    directory.join(format!("{ticker}_{interval}.csv"))
}

/// Save a fetched table into an existing directory.
///
/// The directory is never created; a missing directory is an error.
pub fn save_frame(
    df: &DataFrame,
    directory: &Path,
    ticker: &str,
    interval: Interval,
) -> Result<PathBuf, DataError> {
    if !directory.is_dir() {
        return Err(DataError::Io {
            path: directory.to_path_buf(),
            message: "output directory does not exist".into(),
        });
    }
    let path = frame_path(directory, ticker, interval);
    write_frame_csv(df, &path)?;
    Ok(path)
}

/// Load a table written by [`write_frame_csv`] (or any provider CSV).
pub fn load_frame_csv(path: &Path) -> Result<DataFrame, DataError> {
    let body = fs::read(path).map_err(|e| DataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_price_csv(&body)
}

/// Provider that serves tables previously saved with [`save_frame`].
///
/// Rows outside the requested period are dropped.
pub struct CsvDirectoryProvider {
    directory: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl PriceProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv_directory"
    }

    fn fetch(
        &self,
        ticker: &str,
        period1: i64,
        period2: i64,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let path = frame_path(&self.directory, ticker, interval);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }

        let frame = load_frame_csv(&path)?;
        let dates = frame_dates(&frame).map_err(|e| DataError::Frame(e.to_string()))?;
        let in_range: BooleanChunked = dates
            .iter()
            .map(|d| {
                let ts = local_epoch_seconds(d.and_time(NaiveTime::MIN));
                Some(period1 <= ts && ts <= period2)
            })
            .collect();
        let frame = frame
            .filter(&in_range)
            .map_err(|e| DataError::Frame(format!("filter: {e}")))?;

        Ok(FetchResult {
            ticker: ticker.to_string(),
            frame,
            source: DataSource::CsvFile,
        })
    }
}
