//! End-to-end tests: mock provider → download → align → return ratios.

use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;
use pricepipe_core::calculate_na_per_column;
use pricepipe_core::data::schema::{column_values, date_column, frame_dates};
use pricepipe_core::data::{
    download_tickers_historical_data, load_frame_csv, DataError, DataSource, DownloadOptions,
    DownloadProgress, FailureStage, FetchResult, Interval, NoProgress, PriceProvider, ADJ_CLOSE,
};
use pricepipe_core::{transform_to_target, TickerFrames};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Trading-day table: weekdays in [start, end] minus `holes`.
fn price_table(start: NaiveDate, end: NaiveDate, holes: &[NaiveDate], base: f64) -> DataFrame {
    let dates: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|x| *x <= end)
        .filter(|x| !matches!(x.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|x| !holes.contains(x))
        .collect();
    let closes: Vec<f64> = (0..dates.len()).map(|i| base + i as f64).collect();

    DataFrame::new(vec![
        date_column(&dates).unwrap(),
        Column::new("Close".into(), closes.clone()),
        Column::new(ADJ_CLOSE.into(), closes),
    ])
    .unwrap()
}

/// Serves canned tables; tickers without one fail with `SymbolNotFound`.
struct MockProvider {
    tables: HashMap<String, DataFrame>,
    calls: Mutex<Vec<(String, i64, i64, Interval)>>,
}

impl MockProvider {
    fn new(tables: Vec<(&str, DataFrame)>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|(t, df)| (t.to_string(), df))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl PriceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        ticker: &str,
        period1: i64,
        period2: i64,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        self.calls
            .lock()
            .unwrap()
            .push((ticker.to_string(), period1, period2, interval));
        match self.tables.get(ticker) {
            Some(frame) => Ok(FetchResult {
                ticker: ticker.to_string(),
                frame: frame.clone(),
                source: DataSource::YahooFinance,
            }),
            None => Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: RefCell<Vec<String>>,
}

impl DownloadProgress for RecordingProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        self.events
            .borrow_mut()
            .push(format!("start {ticker} {index}/{total}"));
    }

    fn on_complete(&self, ticker: &str, _: usize, _: usize, result: &Result<(), DataError>) {
        let status = if result.is_ok() { "ok" } else { "fail" };
        self.events.borrow_mut().push(format!("{status} {ticker}"));
    }

    fn on_save_failed(&self, ticker: &str, _: &DataError) {
        self.events.borrow_mut().push(format!("unsaved {ticker}"));
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        self.events
            .borrow_mut()
            .push(format!("done {succeeded}/{total} failed {failed}"));
    }
}

fn three_ticker_provider() -> MockProvider {
    MockProvider::new(vec![
        ("AAA", price_table(d(2024, 1, 2), d(2024, 1, 12), &[], 100.0)),
        ("CCC", price_table(d(2024, 1, 2), d(2024, 1, 12), &[], 50.0)),
    ])
}

#[test]
fn failing_ticker_is_skipped() {
    let provider = three_ticker_provider();
    let progress = RecordingProgress::default();

    let summary = download_tickers_historical_data(
        &provider,
        &["AAA", "BBB", "CCC"],
        &DownloadOptions::default(),
        &progress,
    );

    let fetched: Vec<&str> = summary.frames.keys().map(|k| k.as_str()).collect();
    assert_eq!(fetched, vec!["AAA", "CCC"]);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.skipped(), vec!["BBB"]);
    assert!(matches!(
        summary.failures[0].error,
        DataError::SymbolNotFound { ref symbol } if symbol == "BBB"
    ));

    // Every ticker was requested, in order, exactly once
    let calls = provider.calls.lock().unwrap();
    let requested: Vec<&str> = calls.iter().map(|c| c.0.as_str()).collect();
    assert_eq!(requested, vec!["AAA", "BBB", "CCC"]);

    assert_eq!(
        *progress.events.borrow(),
        vec![
            "start AAA 0/3",
            "ok AAA",
            "start BBB 1/3",
            "fail BBB",
            "start CCC 2/3",
            "ok CCC",
            "done 2/3 failed 1",
        ]
    );
}

#[test]
fn request_window_is_passed_as_epoch_seconds() {
    let provider = three_ticker_provider();
    let opts = DownloadOptions {
        from: d(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap(),
        to: d(2024, 1, 31).and_hms_opt(0, 0, 0).unwrap(),
        interval: Interval::OneWeek,
        ..Default::default()
    };

    download_tickers_historical_data(&provider, &["AAA"], &opts, &NoProgress);

    let calls = provider.calls.lock().unwrap();
    let (_, period1, period2, interval) = &calls[0];
    assert_eq!(period2 - period1, 30 * 86_400);
    assert_eq!(*interval, Interval::OneWeek);
}

#[test]
fn saved_tables_land_in_directory() {
    let dir = tempfile::tempdir().unwrap();
    let provider = three_ticker_provider();
    let opts = DownloadOptions {
        directory: dir.path().to_path_buf(),
        save: true,
        ..Default::default()
    };

    let summary =
        download_tickers_historical_data(&provider, &["AAA", "BBB", "CCC"], &opts, &NoProgress);
    assert_eq!(summary.frames.len(), 2);

    assert!(dir.path().join("AAA_1d.csv").exists());
    assert!(!dir.path().join("BBB_1d.csv").exists());

    let reloaded = load_frame_csv(&dir.path().join("CCC_1d.csv")).unwrap();
    assert!(reloaded.equals_missing(&summary.frames["CCC"]));
}

#[test]
fn save_failure_keeps_fetched_table() {
    let dir = tempfile::tempdir().unwrap();
    let provider = three_ticker_provider();
    let opts = DownloadOptions {
        directory: dir.path().join("does-not-exist"),
        save: true,
        ..Default::default()
    };

    let progress = RecordingProgress::default();

    let summary = download_tickers_historical_data(&provider, &["AAA"], &opts, &progress);

    assert!(summary.frames.contains_key("AAA"));
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].stage, FailureStage::Save);
    assert!(summary.skipped().is_empty());
    assert!(!dir.path().join("does-not-exist").exists());

    // The fetch is reported as a success; the write failure separately
    assert_eq!(
        *progress.events.borrow(),
        vec!["start AAA 0/1", "ok AAA", "unsaved AAA", "done 1/1 failed 0"]
    );
}

#[test]
fn overlapping_spans_align_to_later_end() {
    // AAA: Tue 2024-01-02 .. Fri 2024-01-12, missing Mon 2024-01-08
    // BBB: Thu 2024-01-04 .. Wed 2024-01-17
    let mut frames = TickerFrames::new();
    frames.insert(
        "AAA".into(),
        price_table(d(2024, 1, 2), d(2024, 1, 12), &[d(2024, 1, 8)], 100.0),
    );
    frames.insert(
        "BBB".into(),
        price_table(d(2024, 1, 4), d(2024, 1, 17), &[], 200.0),
    );

    let start = d(2024, 1, 1);
    let returns = transform_to_target(&mut frames, start, 1).unwrap();

    // Weekdays from Mon 2024-01-01 through Wed 2024-01-17
    let expected_dates: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|x| *x <= d(2024, 1, 17))
        .filter(|x| !matches!(x.weekday(), Weekday::Sat | Weekday::Sun))
        .collect();
    assert_eq!(returns.height(), 13);
    assert_eq!(frame_dates(&returns).unwrap(), expected_dates);

    let names: Vec<&str> = returns
        .get_column_names()
        .iter()
        .map(|n| n.as_str())
        .collect();
    assert_eq!(names, vec!["Date", "AAA", "BBB"]);

    let aaa = column_values(returns.column("AAA").unwrap()).unwrap();
    let bbb = column_values(returns.column("BBB").unwrap()).unwrap();

    // First row undefined for both
    assert_eq!(aaa[0], None);
    assert_eq!(bbb[0], None);

    // AAA starts on 01-02, so its first ratio is on 01-03
    assert_eq!(aaa[1], None);
    assert!((aaa[2].unwrap() - 101.0 / 100.0).abs() < 1e-12);

    // The 01-08 gap nulls both 01-08 and the following day
    assert_eq!(aaa[5], None);
    assert_eq!(aaa[6], None);

    // AAA ends on 01-12; the rest of the shared calendar is null
    assert!(aaa[10..].iter().all(|v| v.is_none()));
    assert!(bbb[4..].iter().all(|v| v.is_some()));

    // The mapping itself was aligned in place
    assert_eq!(frames["AAA"].height(), 10);
    assert_eq!(frame_dates(&frames["BBB"]).unwrap()[0], start);
}

#[test]
fn quality_report_on_returns() {
    let mut frames = TickerFrames::new();
    frames.insert(
        "AAA".into(),
        price_table(d(2024, 1, 1), d(2024, 1, 5), &[], 10.0),
    );
    frames.insert(
        "BBB".into(),
        price_table(d(2024, 1, 3), d(2024, 1, 5), &[], 10.0),
    );

    let returns = transform_to_target(&mut frames, d(2024, 1, 1), 1).unwrap();
    let report = calculate_na_per_column(&returns).unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(report[0].column, "AAA");
    assert!((report[0].missing_pct - 20.0).abs() < 1e-9);
    assert_eq!(report[1].column, "BBB");
    assert!((report[1].missing_pct - 60.0).abs() < 1e-9);
}
