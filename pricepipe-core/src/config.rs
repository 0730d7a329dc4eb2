//! Pipeline configuration.
//!
//! A TOML file naming the tickers to fetch, the request window and the
//! alignment/return settings. Every field except `tickers` has a default:
//!
//! ```toml
//! tickers = ["SPY", "QQQ", "TLT"]
//! from = "2018-01-01"
//! interval = "1d"
//! directory = "data"
//! save = true
//! periods = 5
//! fill = "ffill"
//! ```

use crate::calendar::Frequency;
use crate::data::align::{FillMethod, ReindexOptions};
use crate::data::download::{default_from_date, DownloadOptions};
use crate::data::interval::Interval;
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub tickers: Vec<String>,

    /// First day of the requested window.
    #[serde(default = "default_from")]
    pub from: NaiveDate,

    /// Last day of the requested window. Today when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,

    #[serde(default)]
    pub interval: Interval,

    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    #[serde(default)]
    pub save: bool,

    /// First calendar date of the aligned tables. `from` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,

    /// Lag of the return ratios.
    #[serde(default = "default_periods")]
    pub periods: usize,

    #[serde(default = "default_true")]
    pub drop_weekends: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillMethod>,

    #[serde(default)]
    pub freq: Frequency,
}

fn default_from() -> NaiveDate {
    default_from_date().date()
}

fn default_directory() -> PathBuf {
    PathBuf::from("data")
}

fn default_periods() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

impl PipelineConfig {
    /// A config for `tickers` with every other field at its default.
    pub fn for_tickers(tickers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tickers: tickers.into_iter().map(Into::into).collect(),
            from: default_from(),
            to: None,
            interval: Interval::default(),
            directory: default_directory(),
            save: false,
            start: None,
            periods: default_periods(),
            drop_weekends: true,
            fill: None,
            freq: Frequency::default(),
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn ticker_refs(&self) -> Vec<&str> {
        self.tickers.iter().map(|t| t.as_str()).collect()
    }

    /// Fetch window and output settings. A missing `to` resolves to now.
    pub fn download_options(&self) -> DownloadOptions {
        let to = match self.to {
            Some(to) => to.and_time(end_of_day()),
            None => Local::now().naive_local(),
        };
        DownloadOptions {
            from: self.from.and_time(NaiveTime::MIN),
            to,
            interval: self.interval,
            directory: self.directory.clone(),
            save: self.save,
        }
    }

    pub fn alignment_start(&self) -> NaiveDate {
        self.start.unwrap_or(self.from)
    }

    /// Alignment options: explicit start, per-table end.
    pub fn reindex_options(&self) -> ReindexOptions {
        ReindexOptions {
            drop_weekends: self.drop_weekends,
            start: Some(self.alignment_start()),
            fill: self.fill,
            freq: self.freq,
            ..Default::default()
        }
    }
}
