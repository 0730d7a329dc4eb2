//! Download orchestrator: fetches tickers one by one, keeps what succeeds.

use super::codec::save_frame;
use super::interval::Interval;
use super::provider::{DataError, DownloadProgress, PriceProvider};
use crate::transform::TickerFrames;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::path::PathBuf;
use tracing::{info, warn};

/// Options for [`download_tickers_historical_data`].
///
/// `Default` resolves "now" when it is called, so a long-lived process gets a
/// fresh end timestamp for every options value it builds.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Start of the requested period.
    pub from: NaiveDateTime,
    /// End of the requested period.
    pub to: NaiveDateTime,
    pub interval: Interval,
    /// Directory receiving saved CSV files. Must already exist.
    pub directory: PathBuf,
    /// Write each fetched table to `{directory}/{ticker}_{interval}.csv`.
    pub save: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            from: default_from_date(),
            to: Local::now().naive_local(),
            interval: Interval::default(),
            directory: PathBuf::from("data"),
            save: false,
        }
    }
}

/// 2018-01-01 00:00, the default start of the requested period.
pub fn default_from_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2018, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Epoch seconds of a wall-clock time in the local timezone.
///
/// Ambiguous times take the earlier instant; times skipped by a DST jump fall
/// back to UTC.
pub fn local_epoch_seconds(dt: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&dt)
        .earliest()
        .map(|t| t.timestamp())
        .unwrap_or_else(|| dt.and_utc().timestamp())
}

/// Which step failed for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The provider returned an error; the ticker is absent from the result.
    Fetch,
    /// The table was fetched but could not be written; it is still returned.
    Save,
}

#[derive(Debug)]
pub struct FetchFailure {
    pub ticker: String,
    pub stage: FailureStage,
    pub error: DataError,
}

/// Summary of a batch download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    /// Every successfully fetched table.
    pub frames: TickerFrames,
    pub failures: Vec<FetchFailure>,
}

impl DownloadSummary {
    /// Tickers whose table was fetched, including those that failed to save.
    pub fn succeeded(&self) -> usize {
        self.frames.len()
    }

    /// Tickers that were not fetched at all.
    pub fn skipped(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|f| f.stage == FailureStage::Fetch)
            .map(|f| f.ticker.as_str())
            .collect()
    }
}

/// Fetch every ticker in sequence, skipping the ones that fail.
///
/// A fetch failure is logged and the ticker left out of `frames`; the batch
/// continues. With `opts.save` set each table is written after it has been
/// recorded, so a failed write leaves the table in the result, counts as a
/// successful fetch and only adds a [`FailureStage::Save`] entry.
pub fn download_tickers_historical_data(
    provider: &dyn PriceProvider,
    tickers: &[&str],
    opts: &DownloadOptions,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let period1 = local_epoch_seconds(opts.from);
    let period2 = local_epoch_seconds(opts.to);
    let total = tickers.len();

    let mut frames = TickerFrames::new();
    let mut failures: Vec<FetchFailure> = Vec::new();

    for (i, ticker) in tickers.iter().enumerate() {
        progress.on_start(ticker, i, total);

        let fetched = match provider.fetch(ticker, period1, period2, opts.interval) {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(ticker, provider = provider.name(), %error, "skipping ticker");
                let result = Err(error);
                progress.on_complete(ticker, i, total, &result);
                if let Err(error) = result {
                    failures.push(FetchFailure {
                        ticker: ticker.to_string(),
                        stage: FailureStage::Fetch,
                        error,
                    });
                }
                continue;
            }
        };

        info!(
            ticker,
            rows = fetched.frame.height(),
            source = ?fetched.source,
            "fetched price history"
        );

        let saved = if opts.save {
            save_frame(&fetched.frame, &opts.directory, ticker, opts.interval).map(|_| ())
        } else {
            Ok(())
        };
        frames.insert(ticker.to_string(), fetched.frame);
        progress.on_complete(ticker, i, total, &Ok(()));

        if let Err(error) = saved {
            warn!(ticker, %error, "failed to save price history");
            progress.on_save_failed(ticker, &error);
            failures.push(FetchFailure {
                ticker: ticker.to_string(),
                stage: FailureStage::Save,
                error,
            });
        }
    }

    let summary = DownloadSummary {
        total,
        frames,
        failures,
    };
    let succeeded = summary.succeeded();
    progress.on_batch_complete(succeeded, total - succeeded, total);
    summary
}
