//! Yahoo Finance data provider.
//!
//! Fetches price history from Yahoo's v7 CSV download endpoint. One blocking
//! request per ticker and no retries: a failed request is reported to the
//! caller, which decides whether to skip the ticker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! Saved CSV files (see [`super::codec::CsvDirectoryProvider`]) are the fallback
//! when Yahoo is unavailable.

use super::codec::parse_price_csv;
use super::interval::Interval;
use super::provider::{DataError, DataSource, FetchResult, PriceProvider};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| {
                DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the provider at another host (mirrors, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the download URL for a ticker and time range.
    fn download_url(&self, ticker: &str, period1: i64, period2: i64, interval: Interval) -> String {
        format!(
            "{}/v7/finance/download/{ticker}\
             ?period1={period1}&period2={period2}&interval={interval}\
             &events=history&includeAdjustedClose=true",
            self.base_url
        )
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        ticker: &str,
        period1: i64,
        period2: i64,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let url = self.download_url(ticker, period1, period2, interval);
        debug!(%url, "requesting price history");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationRequired(format!(
                "Yahoo Finance refused the download ({status})"
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {ticker}")));
        }

        let body = resp.bytes().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to read response for {ticker}: {e}"))
        })?;
        let frame = parse_price_csv(&body)?;

        if frame.height() == 0 {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }

        Ok(FetchResult {
            ticker: ticker.to_string(),
            frame,
            source: DataSource::YahooFinance,
        })
    }
}
