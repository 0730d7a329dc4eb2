//! pricepipe core: fetch price histories, align them on a common calendar and
//! derive return-ratio features.
//!
//! Pipeline:
//! - [`data::download_tickers_historical_data`] fetches one table per ticker,
//!   skipping tickers that fail
//! - [`data::reindex_weekdays`] reindexes a table onto a regular calendar
//! - [`transform::transform_to_target`] aligns every table and computes
//!   `1 + pct_change` of the adjusted close
//! - [`quality::calculate_na_per_column`] reports missing data per column

pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod quality;
pub mod transform;

pub use config::{ConfigError, PipelineConfig};
pub use error::PipelineError;
pub use quality::{calculate_na_per_column, ColumnQuality};
pub use transform::{
    apply_to_dataframe, calculate_pct_returns, transform_to_target, transform_with_options, Axis,
    TickerFrames,
};
