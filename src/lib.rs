//! Folio - portfolio bookkeeping and mean-variance risk statistics.
//!
//! # Overview
//!
//! Folio keeps a set of positions (an asset plus a quantity), keyed and
//! ordered by asset name, and computes portfolio-level statistics from a
//! correlation matrix:
//!
//! - **Positions**: add, remove, merge with parameter consistency checks
//! - **Risk**: value-weighted expected return, variance, volatility and
//!   per-asset variance contributions
//! - **Correlation**: validation gate, labeled matrices, Pearson estimates
//!   from daily log-returns
//! - **Market data**: annualized drift and volatility from price histories
//! - **Import/export**: positions CSV, risk reports as CSV or JSON
//! - **Configuration files**: TOML-based run configuration
//!
//! # Quick Start
//!
//! ```
//! use folio::{Asset, CorrelationMatrix, Portfolio};
//!
//! let mut portfolio = Portfolio::new();
//! portfolio.add_position(Asset::new("AAPL", 200.0, 0.08, 0.20)?, 10.0)?;
//! portfolio.add_position(Asset::new("BOND", 100.0, 0.04, 0.05)?, 20.0)?;
//!
//! let corr = CorrelationMatrix::identity(portfolio.len());
//! assert!((portfolio.expected_return() - 0.06).abs() < 1e-12);
//! assert!((portfolio.variance(&corr)? - 0.010625).abs() < 1e-12);
//! # Ok::<(), folio::PortfolioError>(())
//! ```
//!
//! # Asset Order
//!
//! Every vector and matrix exchanged with a portfolio is indexed by
//! [`Portfolio::asset_order`], the lexically sorted asset names. Row `i` of a
//! correlation matrix belongs to the `i`-th name in that order. Matrices
//! built with [`CorrelationMatrix::with_labels`] are checked against it.

pub mod analytics;
pub mod asset;
pub mod config;
pub mod correlation;
pub mod error;
pub mod export;
pub mod market_data;
pub mod portfolio;
pub mod risk;

pub use analytics::ReportFormatter;
pub use asset::Asset;
pub use config::FolioFileConfig;
pub use correlation::{parse_matrix_text, pearson, CorrelationMatrix};
pub use error::{ErrorKind, PortfolioError, Result};
pub use export::{export_csv, export_csv_string, import_csv, import_csv_str};
pub use market_data::{
    CsvPriceProvider, InMemoryProvider, MarketDataProvider, MarketDataSettings, MarketQuote,
};
pub use portfolio::{Portfolio, Position};
pub use risk::RiskReport;
