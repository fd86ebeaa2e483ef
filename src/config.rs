//! Configuration file support.
//!
//! A run configuration names the positions file, where the correlation
//! matrix comes from, and how price histories are interpreted, so a risk
//! report can be reproduced from a single TOML file.

use crate::correlation::{parse_matrix_text, CorrelationMatrix};
use crate::error::{PortfolioError, Result};
use crate::market_data::{CsvPriceProvider, MarketDataProvider, MarketDataSettings};
use crate::portfolio::Portfolio;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioFileConfig {
    /// Positions file.
    #[serde(default)]
    pub portfolio: PortfolioSettings,
    /// Correlation matrix source.
    #[serde(default)]
    pub correlation: CorrelationSettings,
    /// Price history settings.
    #[serde(default)]
    pub market_data: MarketDataFileSettings,
    /// Report output settings.
    #[serde(default)]
    pub output: OutputSettings,
}

/// Positions file settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSettings {
    /// Path to a `name,price,mu,sigma,qty` CSV file.
    pub path: Option<String>,
}

/// Where the correlation matrix comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationSource {
    /// Uncorrelated assets.
    #[default]
    Identity,
    /// Matrix text file, rows in asset order.
    File,
    /// Pearson correlation of daily log-returns from the price histories.
    Market,
}

/// Correlation matrix settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationSettings {
    #[serde(default)]
    pub source: CorrelationSource,
    /// Matrix text file, for `source = "file"`.
    pub path: Option<String>,
}

/// Price history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataFileSettings {
    /// Directory holding one `<TICKER>.csv` history per asset.
    #[serde(default = "default_market_dir")]
    pub dir: String,
    /// Trading days per year for annualization.
    #[serde(default = "default_trading_days")]
    pub trading_days: f64,
    /// Minimum closes per history.
    #[serde(default = "default_min_closes")]
    pub min_closes: usize,
    /// Minimum valid daily returns per history.
    #[serde(default = "default_min_returns")]
    pub min_returns: usize,
}

fn default_market_dir() -> String { "data".to_string() }
fn default_trading_days() -> f64 { 252.0 }
fn default_min_closes() -> usize { 30 }
fn default_min_returns() -> usize { 20 }

impl Default for MarketDataFileSettings {
    fn default() -> Self {
        Self {
            dir: default_market_dir(),
            trading_days: default_trading_days(),
            min_closes: default_min_closes(),
            min_returns: default_min_returns(),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// "text", "json" or "csv".
    #[serde(default = "default_format")]
    pub format: String,
    /// Decimal places in text reports.
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_format() -> String { "text".to_string() }
fn default_precision() -> usize { 4 }

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: default_format(),
            precision: default_precision(),
        }
    }
}

impl FolioFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: FolioFileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PortfolioError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Provider settings for the price histories.
    pub fn market_data_settings(&self) -> Result<MarketDataSettings> {
        let md = &self.market_data;
        if md.trading_days <= 0.0 {
            return Err(PortfolioError::ConfigError(format!(
                "market_data.trading_days must be > 0, got {}",
                md.trading_days
            )));
        }
        if md.min_closes < 2 || md.min_returns < 2 {
            return Err(PortfolioError::ConfigError(
                "market_data.min_closes and min_returns must be >= 2".to_string(),
            ));
        }
        Ok(MarketDataSettings {
            trading_days: md.trading_days,
            min_closes: md.min_closes,
            min_returns: md.min_returns,
        })
    }

    /// CSV price provider over `market_data.dir`.
    pub fn price_provider(&self) -> Result<CsvPriceProvider> {
        Ok(CsvPriceProvider::new(&self.market_data.dir)
            .with_settings(self.market_data_settings()?))
    }

    /// Load the configured positions file.
    pub fn load_portfolio(&self) -> Result<Portfolio> {
        let path = self.portfolio.path.as_ref().ok_or_else(|| {
            PortfolioError::ConfigError("No portfolio path specified in config".to_string())
        })?;
        crate::export::import_csv(path)
    }

    /// Build the correlation matrix for `portfolio` from the configured source.
    pub fn correlation_for(&self, portfolio: &Portfolio) -> Result<CorrelationMatrix> {
        match self.correlation.source {
            CorrelationSource::Identity => Ok(CorrelationMatrix::identity(portfolio.len())),
            CorrelationSource::File => {
                let path = self.correlation.path.as_ref().ok_or_else(|| {
                    PortfolioError::ConfigError(
                        "correlation.source = \"file\" requires correlation.path".to_string(),
                    )
                })?;
                info!("Loading correlation matrix from: {}", path);
                parse_matrix_text(&fs::read_to_string(path)?)
            }
            CorrelationSource::Market => self
                .price_provider()?
                .correlation_matrix(&portfolio.asset_order()),
        }
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# Folio run configuration

[portfolio]
path = "portfolio.csv"    # columns: name,price,mu,sigma,qty

[correlation]
source = "identity"       # "identity", "file" or "market"
# path = "corr.txt"       # one row per line, in asset order (sorted names)

[market_data]
dir = "data"              # <TICKER>.csv files with Date,Close columns
trading_days = 252.0
min_closes = 30
min_returns = 20

[output]
format = "text"           # "text", "json" or "csv"
precision = 4
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FolioFileConfig::default();
        assert_eq!(config.correlation.source, CorrelationSource::Identity);
        assert_eq!(config.market_data.trading_days, 252.0);
        assert_eq!(config.output.precision, 4);
        assert!(config.portfolio.path.is_none());
    }

    #[test]
    fn test_load_config() {
        let toml_content = r#"
[portfolio]
path = "book.csv"

[correlation]
source = "file"
path = "corr.txt"

[market_data]
dir = "prices"
min_closes = 60
"#;
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", toml_content).unwrap();

        let config = FolioFileConfig::load(file.path()).unwrap();
        assert_eq!(config.portfolio.path.as_deref(), Some("book.csv"));
        assert_eq!(config.correlation.source, CorrelationSource::File);
        assert_eq!(config.market_data.dir, "prices");
        assert_eq!(config.market_data.min_closes, 60);
        assert_eq!(config.market_data.min_returns, 20);
        assert_eq!(config.output.format, "text");
    }

    #[test]
    fn test_save_config() {
        let config = FolioFileConfig::default();
        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();

        let loaded = FolioFileConfig::load(file.path()).unwrap();
        assert_eq!(loaded.market_data.dir, config.market_data.dir);
        assert_eq!(loaded.correlation.source, config.correlation.source);
    }

    #[test]
    fn test_example_config_parses() {
        let example = FolioFileConfig::example();
        assert!(example.contains("[portfolio]"));
        assert!(example.contains("[correlation]"));
        let parsed: FolioFileConfig = toml::from_str(&example).unwrap();
        assert_eq!(parsed.portfolio.path.as_deref(), Some("portfolio.csv"));
    }

    #[test]
    fn test_invalid_market_settings() {
        let mut config = FolioFileConfig::default();
        config.market_data.trading_days = 0.0;
        assert!(matches!(
            config.market_data_settings(),
            Err(PortfolioError::ConfigError(_))
        ));
    }

    #[test]
    fn test_correlation_sources() {
        let mut portfolio = Portfolio::new();
        portfolio
            .add_position(crate::asset::Asset::new("A", 1.0, 0.0, 0.1).unwrap(), 1.0)
            .unwrap();
        portfolio
            .add_position(crate::asset::Asset::new("B", 1.0, 0.0, 0.1).unwrap(), 1.0)
            .unwrap();

        let config = FolioFileConfig::default();
        let m = config.correlation_for(&portfolio).unwrap();
        assert_eq!(m, CorrelationMatrix::identity(2));

        let mut matrix_file = NamedTempFile::new().unwrap();
        writeln!(matrix_file, "1 0.4\n0.4 1").unwrap();
        let config = FolioFileConfig {
            correlation: CorrelationSettings {
                source: CorrelationSource::File,
                path: Some(matrix_file.path().display().to_string()),
            },
            ..Default::default()
        };
        let m = config.correlation_for(&portfolio).unwrap();
        assert_eq!(m.get(0, 1), Some(0.4));

        let missing_path = FolioFileConfig {
            correlation: CorrelationSettings {
                source: CorrelationSource::File,
                path: None,
            },
            ..Default::default()
        };
        assert!(matches!(
            missing_path.correlation_for(&portfolio),
            Err(PortfolioError::ConfigError(_))
        ));
    }
}
