//! Market data providers.
//!
//! A provider supplies a chronological close-price series per ticker. From
//! it the provided trait methods derive the quote an [`Asset`] is built from
//! (last close, annualized mean and volatility of daily log-returns) and the
//! return-based correlation matrix for a set of tickers.
//!
//! Providers do not retry; failures propagate to the caller unchanged.

use crate::asset::Asset;
use crate::correlation::{CorrelationMatrix, MIN_ALIGNED_RETURNS};
use crate::error::{PortfolioError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Minimum closes a history must contain.
pub const MIN_CLOSES: usize = 30;
/// Minimum valid daily returns a history must yield.
pub const MIN_RETURNS: usize = 20;

/// Limits and annualization convention shared by the providers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketDataSettings {
    pub trading_days: f64,
    pub min_closes: usize,
    pub min_returns: usize,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            trading_days: TRADING_DAYS_PER_YEAR,
            min_closes: MIN_CLOSES,
            min_returns: MIN_RETURNS,
        }
    }
}

/// Last price plus annualized statistics for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub last_price: f64,
    pub expected_return: f64,
    pub volatility: f64,
}

/// Source of historical close prices.
pub trait MarketDataProvider {
    /// Chronological close prices for `ticker`.
    fn closes(&self, ticker: &str) -> Result<Vec<f64>>;

    fn settings(&self) -> MarketDataSettings {
        MarketDataSettings::default()
    }

    /// Daily log-returns for `ticker`.
    fn daily_returns(&self, ticker: &str) -> Result<Vec<f64>> {
        let settings = self.settings();
        let closes = checked_closes(self.closes(ticker)?, settings.min_closes)?;
        log_returns(&closes, settings.min_returns)
    }

    /// Last close and annualized mean/volatility of daily log-returns.
    fn quote(&self, ticker: &str) -> Result<MarketQuote> {
        let settings = self.settings();
        let closes = checked_closes(self.closes(ticker)?, settings.min_closes)?;
        let returns = log_returns(&closes, settings.min_returns)?;
        let (expected_return, volatility) = annualize(&returns, settings.trading_days)?;

        let last_price = closes.last().copied().ok_or(PortfolioError::InsufficientData {
            required: settings.min_closes,
            available: 0,
        })?;

        Ok(MarketQuote {
            last_price,
            expected_return,
            volatility,
        })
    }

    /// Asset named `ticker` built from [`MarketDataProvider::quote`].
    fn fetch_asset(&self, ticker: &str) -> Result<Asset> {
        let q = self.quote(ticker)?;
        Asset::new(ticker, q.last_price, q.expected_return, q.volatility)
    }

    /// Correlation of daily log-returns, labeled and indexed in the order of `tickers`.
    fn correlation_matrix(&self, tickers: &[String]) -> Result<CorrelationMatrix> {
        let series = tickers
            .iter()
            .map(|t| self.daily_returns(t))
            .collect::<Result<Vec<_>>>()?;
        let matrix = CorrelationMatrix::from_return_series_with_min(
            &series,
            self.settings().min_returns.max(MIN_ALIGNED_RETURNS),
        )?;
        Ok(CorrelationMatrix::with_labels(
            tickers.to_vec(),
            matrix.rows().to_vec(),
        ))
    }
}

fn checked_closes(closes: Vec<f64>, min_closes: usize) -> Result<Vec<f64>> {
    if closes.len() < min_closes {
        return Err(PortfolioError::InsufficientData {
            required: min_closes,
            available: closes.len(),
        });
    }
    Ok(closes)
}

/// Daily log-returns `ln(p[i] / p[i-1])`, skipping pairs where either price
/// is not positive. Fails when fewer than `min_returns` remain.
pub fn log_returns(closes: &[f64], min_returns: usize) -> Result<Vec<f64>> {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();

    if returns.len() < min_returns {
        return Err(PortfolioError::InsufficientData {
            required: min_returns,
            available: returns.len(),
        });
    }
    Ok(returns)
}

/// Annualized `(mean, stdev)` of daily returns: `mean * T` and
/// `sample_stdev * sqrt(T)` with the n-1 divisor.
pub fn annualize(returns: &[f64], trading_days: f64) -> Result<(f64, f64)> {
    if returns.len() < 2 {
        return Err(PortfolioError::InsufficientData {
            required: 2,
            available: returns.len(),
        });
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stdev = variance.max(0.0).sqrt();

    Ok((mean * trading_days, stdev * trading_days.sqrt()))
}

/// Provider backed by a map of ticker to close series.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, Vec<f64>>,
    settings: MarketDataSettings,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: MarketDataSettings) -> Self {
        Self {
            series: HashMap::new(),
            settings,
        }
    }

    /// Register (or replace) the close series of a ticker.
    pub fn insert(&mut self, ticker: impl Into<String>, closes: Vec<f64>) {
        self.series.insert(ticker.into(), closes);
    }
}

impl MarketDataProvider for InMemoryProvider {
    fn closes(&self, ticker: &str) -> Result<Vec<f64>> {
        self.series
            .get(ticker)
            .cloned()
            .ok_or_else(|| PortfolioError::MarketData(format!("no price history for {}", ticker)))
    }

    fn settings(&self) -> MarketDataSettings {
        self.settings
    }
}

/// Raw price-history row.
#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(
        alias = "Date",
        alias = "DATE",
        alias = "Timestamp",
        alias = "timestamp",
        alias = "Datetime",
        alias = "datetime"
    )]
    date: String,
    #[serde(
        alias = "Close",
        alias = "CLOSE",
        alias = "c"
    )]
    close: Option<String>,
}

/// Provider reading `<dir>/<TICKER>.csv` files with a date and a close column.
///
/// Rows are sorted by date; rows with an empty or `null` close are skipped.
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    dir: PathBuf,
    settings: MarketDataSettings,
}

impl CsvPriceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            settings: MarketDataSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MarketDataSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Path of the history file for `ticker`.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
}

impl MarketDataProvider for CsvPriceProvider {
    fn closes(&self, ticker: &str) -> Result<Vec<f64>> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(PortfolioError::MarketData(format!(
                "no price history for {} at {}",
                ticker,
                path.display()
            )));
        }
        load_closes(&path)
    }

    fn settings(&self) -> MarketDataSettings {
        self.settings
    }
}

/// Load a chronological close series from a CSV price history.
pub fn load_closes(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let path = path.as_ref();
    info!("Loading price history from: {}", path.display());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut points: Vec<(DateTime<Utc>, f64)> = Vec::new();
    let mut skipped = 0;

    for (row_num, result) in reader.deserialize::<PriceRow>().enumerate() {
        let row = result?;
        let close = match row.close.as_deref() {
            None | Some("") | Some("null") => {
                skipped += 1;
                continue;
            }
            Some(raw) => raw.parse::<f64>().map_err(|_| {
                PortfolioError::MarketData(format!(
                    "{}: row {}: invalid close {:?}",
                    path.display(),
                    row_num + 1,
                    raw
                ))
            })?,
        };
        let timestamp = parse_date(&row.date).ok_or_else(|| {
            PortfolioError::MarketData(format!(
                "{}: row {}: unrecognized date {:?}",
                path.display(),
                row_num + 1,
                row.date
            ))
        })?;
        points.push((timestamp, close));
    }

    if skipped > 0 {
        warn!("Skipped {} rows without a close in {}", skipped, path.display());
    }

    points.sort_by_key(|(ts, _)| *ts);
    debug!("Loaded {} closes from {}", points.len(), path.display());
    Ok(points.into_iter().map(|(_, c)| c).collect())
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%b-%Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }

    // Unix seconds
    s.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}
