//! Price data: providers, CSV codec, batch download and calendar alignment.

pub mod align;
pub mod codec;
pub mod download;
pub mod interval;
pub mod provider;
pub mod schema;
pub mod yahoo;

pub use align::{reindex_weekdays, FillMethod, ReindexOptions};
pub use codec::{
    load_frame_csv, parse_price_csv, save_frame, write_frame_csv, CsvDirectoryProvider,
};
pub use download::{
    download_tickers_historical_data, DownloadOptions, DownloadSummary, FailureStage, FetchFailure,
};
pub use interval::Interval;
pub use provider::{
    DataError, DataSource, DownloadProgress, FetchResult, NoProgress, PriceProvider, StdoutProgress,
};
pub use schema::{ADJ_CLOSE, DATE_COLUMN};
pub use yahoo::YahooProvider;
