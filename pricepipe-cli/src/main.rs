//! pricepipe CLI: download price histories and derive return ratios.
//!
//! Commands:
//! - `download`: fetch tickers from Yahoo Finance, optionally saving one CSV each
//! - `returns`: fetch (or load saved CSVs), align and compute return ratios
//! - `quality`: report the share of missing values per column of a CSV table

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use polars::prelude::DataFrame;
use pricepipe_core::calendar::Frequency;
use pricepipe_core::data::{
    download_tickers_historical_data, load_frame_csv, write_frame_csv, CsvDirectoryProvider,
    DownloadSummary, FailureStage, FillMethod, Interval, PriceProvider, StdoutProgress,
    YahooProvider,
};
use pricepipe_core::{
    calculate_na_per_column, transform_with_options, ColumnQuality, PipelineConfig,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricepipe",
    about = "pricepipe CLI: price history download, calendar alignment and return ratios"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download price history from Yahoo Finance.
    Download {
        /// Tickers to download (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 2018-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Sampling interval: 1d, 1wk or 1mo.
        #[arg(long, default_value = "1d")]
        interval: Interval,

        /// Output directory for saved CSV files. Must already exist.
        #[arg(long, default_value = "data")]
        dir: PathBuf,

        /// Save each fetched table as {ticker}_{interval}.csv.
        #[arg(long, default_value_t = false)]
        save: bool,
    },
    /// Compute period-over-period return ratios of the adjusted close.
    Returns(ReturnsArgs),
    /// Report the percentage of missing values per column of a CSV table.
    Quality {
        /// CSV file whose first column is a date.
        file: PathBuf,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct ReturnsArgs {
    /// Tickers (ignored when --config is given).
    tickers: Vec<String>,

    /// Path to a TOML pipeline config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// First day of the download window (YYYY-MM-DD).
    #[arg(long)]
    from: Option<String>,

    /// Last day of the download window (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// First calendar date of the aligned table. Defaults to --from.
    #[arg(long)]
    start: Option<String>,

    /// Lag of the return ratios, in rows.
    #[arg(long)]
    periods: Option<usize>,

    /// Calendar frequency: D, B or W.
    #[arg(long)]
    freq: Option<Frequency>,

    /// Fill gaps after alignment: ffill or bfill.
    #[arg(long)]
    fill: Option<FillMethod>,

    /// Keep Saturday and Sunday rows in the aligned tables.
    #[arg(long, default_value_t = false)]
    keep_weekends: bool,

    /// Read saved CSV files from --dir instead of the network.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Directory of saved CSV files.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Write the ratio table to this CSV file instead of printing it.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the quality report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            tickers,
            start,
            end,
            interval,
            dir,
            save,
        } => run_download(tickers, start, end, interval, dir, save),
        Commands::Returns(args) => {
            let cfg = build_returns_config(&args)?;
            run_returns(&cfg, args.offline, args.output.as_deref(), args.json)
        }
        Commands::Quality { file, json } => run_quality(&file, json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

fn run_download(
    tickers: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    interval: Interval,
    dir: PathBuf,
    save: bool,
) -> Result<()> {
    let mut cfg = PipelineConfig::for_tickers(tickers);
    if let Some(start) = start.as_deref() {
        cfg.from = parse_date(start)?;
    }
    cfg.to = end.as_deref().map(parse_date).transpose()?;
    cfg.interval = interval;
    cfg.directory = dir;
    cfg.save = save;

    let provider = YahooProvider::new()?;
    let summary = download_tickers_historical_data(
        &provider,
        &cfg.ticker_refs(),
        &cfg.download_options(),
        &StdoutProgress,
    );

    report_failures(&summary);
    if summary.frames.is_empty() && summary.total > 0 {
        std::process::exit(1);
    }

    for (ticker, frame) in &summary.frames {
        println!("{ticker}: {} rows", frame.height());
    }
    Ok(())
}

fn build_returns_config(args: &ReturnsArgs) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None if args.tickers.is_empty() => bail!("either tickers or --config is required"),
        None => PipelineConfig::for_tickers(args.tickers.iter().cloned()),
    };

    if let Some(from) = args.from.as_deref() {
        cfg.from = parse_date(from)?;
    }
    if let Some(end) = args.end.as_deref() {
        cfg.to = Some(parse_date(end)?);
    }
    if let Some(start) = args.start.as_deref() {
        cfg.start = Some(parse_date(start)?);
    }
    if let Some(periods) = args.periods {
        cfg.periods = periods;
    }
    if let Some(freq) = args.freq {
        cfg.freq = freq;
    }
    if args.fill.is_some() {
        cfg.fill = args.fill;
    }
    if args.keep_weekends {
        cfg.drop_weekends = false;
    }
    if let Some(dir) = &args.dir {
        cfg.directory = dir.clone();
    }
    Ok(cfg)
}

fn run_returns(
    cfg: &PipelineConfig,
    offline: bool,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let provider: Box<dyn PriceProvider> = if offline {
        Box::new(CsvDirectoryProvider::new(&cfg.directory))
    } else {
        Box::new(YahooProvider::new()?)
    };

    let mut opts = cfg.download_options();
    // Saved files are the input in offline mode; never rewrite them.
    opts.save &= !offline;

    let summary = download_tickers_historical_data(
        provider.as_ref(),
        &cfg.ticker_refs(),
        &opts,
        &StdoutProgress,
    );
    report_failures(&summary);
    if summary.frames.is_empty() {
        eprintln!("No ticker could be fetched from {}", provider.name());
        std::process::exit(1);
    }

    let mut frames = summary.frames;
    let returns = transform_with_options(&mut frames, &cfg.reindex_options(), cfg.periods)
        .context("failed to compute return ratios")?;

    match output {
        Some(path) => {
            write_frame_csv(&returns, path)?;
            info!(path = %path.display(), rows = returns.height(), "wrote return ratios");
            println!(
                "Wrote {} rows x {} tickers to {}",
                returns.height(),
                frames.len(),
                path.display()
            );
        }
        None => println!("{returns}"),
    }

    print_quality(&returns, json)
}

fn run_quality(file: &Path, json: bool) -> Result<()> {
    let table = load_frame_csv(file).with_context(|| format!("failed to load {}", file.display()))?;
    print_quality(&table, json)
}

fn print_quality(table: &DataFrame, json: bool) -> Result<()> {
    let report = calculate_na_per_column(table)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("=== Missing Values ({} rows) ===", table.height());
    println!("{:<20} {:>10}", "Column", "Missing");
    println!("{}", "-".repeat(31));
    for ColumnQuality {
        column,
        missing_pct,
    } in &report
    {
        println!("{:<20} {:>9.2}%", column, missing_pct);
    }
    Ok(())
}

fn report_failures(summary: &DownloadSummary) {
    for failure in &summary.failures {
        let stage = match failure.stage {
            FailureStage::Fetch => "skipped",
            FailureStage::Save => "not saved",
        };
        eprintln!("Error for {} ({stage}): {}", failure.ticker, failure.error);
    }
}
