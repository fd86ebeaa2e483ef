//! Tradable instrument description.

use crate::error::{PortfolioError, Result};
use serde::{Deserialize, Serialize};

/// A tradable instrument: name, last price, annualized expected return (mu)
/// and annualized volatility (sigma).
///
/// Only the price can change after construction, through [`Asset::set_price`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AssetFields")]
pub struct Asset {
    name: String,
    price: f64,
    expected_return: f64,
    volatility: f64,
}

/// Unvalidated field set used to route deserialization through [`Asset::new`].
#[derive(Deserialize)]
struct AssetFields {
    name: String,
    price: f64,
    expected_return: f64,
    volatility: f64,
}

impl TryFrom<AssetFields> for Asset {
    type Error = PortfolioError;

    fn try_from(f: AssetFields) -> Result<Self> {
        Asset::new(f.name, f.price, f.expected_return, f.volatility)
    }
}

impl Asset {
    /// Create a new asset.
    ///
    /// Fails with [`PortfolioError::InvalidArgument`] when the name is empty,
    /// the price is negative, or the volatility is negative. The expected
    /// return is unrestricted.
    pub fn new(
        name: impl Into<String>,
        price: f64,
        expected_return: f64,
        volatility: f64,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PortfolioError::invalid("asset name must be non-empty"));
        }
        check_price(price)?;
        if volatility.is_nan() || volatility < 0.0 {
            return Err(PortfolioError::invalid(format!(
                "asset {}: volatility must be >= 0, got {}",
                name, volatility
            )));
        }

        Ok(Self {
            name,
            price,
            expected_return,
            volatility,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Annualized expected return (mu).
    pub fn expected_return(&self) -> f64 {
        self.expected_return
    }

    /// Annualized volatility (sigma).
    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    /// Replace the price. Negative prices are rejected and leave the asset unchanged.
    pub fn set_price(&mut self, price: f64) -> Result<()> {
        check_price(price)?;
        self.price = price;
        Ok(())
    }

    /// Whether mu and sigma agree with `other` within an absolute tolerance.
    pub fn same_parameters(&self, other: &Asset, tolerance: f64) -> bool {
        (self.expected_return - other.expected_return).abs() <= tolerance
            && (self.volatility - other.volatility).abs() <= tolerance
    }
}

fn check_price(price: f64) -> Result<()> {
    // NaN fails the comparison as well.
    if price >= 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::invalid(format!(
            "price must be >= 0, got {}",
            price
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_creation() {
        let asset = Asset::new("MSFT", 100.0, 0.08, 0.2).unwrap();
        assert_eq!(asset.name(), "MSFT");
        assert_eq!(asset.price(), 100.0);
        assert_eq!(asset.expected_return(), 0.08);
        assert_eq!(asset.volatility(), 0.2);
    }

    #[test]
    fn test_asset_validation() {
        assert!(matches!(
            Asset::new("", 10.0, 0.05, 0.1),
            Err(PortfolioError::InvalidArgument(_))
        ));
        assert!(matches!(
            Asset::new("AAPL", -1.0, 0.05, 0.1),
            Err(PortfolioError::InvalidArgument(_))
        ));
        assert!(matches!(
            Asset::new("AAPL", 1.0, 0.05, -0.1),
            Err(PortfolioError::InvalidArgument(_))
        ));
        assert!(Asset::new("AAPL", 1.0, f64::NAN, 0.1).is_ok());
        assert!(Asset::new("AAPL", f64::NAN, 0.05, 0.1).is_err());
    }

    #[test]
    fn test_zero_price_and_negative_return_allowed() {
        let asset = Asset::new("DEAD", 0.0, -0.4, 0.0).unwrap();
        assert_eq!(asset.price(), 0.0);
        assert_eq!(asset.expected_return(), -0.4);
    }

    #[test]
    fn test_set_price() {
        let mut asset = Asset::new("MSFT", 100.0, 0.08, 0.2).unwrap();
        assert!(asset.set_price(-3.0).is_err());
        assert_eq!(asset.price(), 100.0);

        asset.set_price(120.0).unwrap();
        assert_eq!(asset.price(), 120.0);
    }

    #[test]
    fn test_same_parameters() {
        let a = Asset::new("X", 10.0, 0.1, 0.2).unwrap();
        let b = Asset::new("X", 99.0, 0.1 + 1e-13, 0.2).unwrap();
        let c = Asset::new("X", 10.0, 0.1, 0.21).unwrap();
        assert!(a.same_parameters(&b, 1e-12));
        assert!(!a.same_parameters(&c, 1e-12));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: std::result::Result<Asset, _> = serde_json::from_str(
            r#"{"name":"AAPL","price":200.0,"expected_return":0.1,"volatility":0.2}"#,
        );
        assert!(ok.is_ok());

        let bad: std::result::Result<Asset, _> = serde_json::from_str(
            r#"{"name":"AAPL","price":-5.0,"expected_return":0.1,"volatility":0.2}"#,
        );
        assert!(bad.is_err());
    }
}
