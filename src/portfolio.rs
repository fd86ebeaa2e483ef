//! Portfolio and position management.
//!
//! A [`Portfolio`] maps asset names to [`Position`]s and always iterates them
//! in ascending lexical order of the name. That order ([`Portfolio::asset_order`])
//! is the index order of weights, volatilities, variance contributions, and
//! of any correlation matrix handed to the risk methods.

use crate::asset::Asset;
use crate::correlation::CorrelationMatrix;
use crate::error::{PortfolioError, Result};
use crate::risk::{self, RiskReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Add;

/// Absolute tolerance when comparing mu/sigma of two assets sharing a name.
pub const PARAMETER_TOLERANCE: f64 = 1e-12;

/// A strictly positive quantity of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    asset: Asset,
    quantity: f64,
}

impl Position {
    /// Create a position. Fails with `InvalidArgument` unless `quantity > 0`.
    pub fn new(asset: Asset, quantity: f64) -> Result<Self> {
        check_quantity(quantity, "position")?;
        Ok(Self { asset, quantity })
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Mutable access to the asset. Only its price can be changed.
    pub fn asset_mut(&mut self) -> &mut Asset {
        &mut self.asset
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Market value: price times quantity.
    pub fn value(&self) -> f64 {
        self.asset.price() * self.quantity
    }
}

/// Collection of positions keyed by asset name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Portfolio {
    positions: BTreeMap<String, Position>,
}

impl Portfolio {
    /// Create an empty portfolio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct assets.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Add `quantity` units of `asset`.
    ///
    /// A new name creates a position. An existing name must carry the same
    /// mu and sigma (within [`PARAMETER_TOLERANCE`]); the quantities are then
    /// summed and the stored asset, including its price, is kept as is.
    pub fn add_position(&mut self, asset: Asset, quantity: f64) -> Result<()> {
        check_quantity(quantity, "add_position")?;

        match self.positions.get_mut(asset.name()) {
            None => {
                let name = asset.name().to_string();
                self.positions.insert(name, Position { asset, quantity });
            }
            Some(existing) => {
                if !existing.asset.same_parameters(&asset, PARAMETER_TOLERANCE) {
                    return Err(PortfolioError::invalid(format!(
                        "asset parameters mismatch for {}: stored mu={} sigma={}, got mu={} sigma={}",
                        asset.name(),
                        existing.asset.expected_return(),
                        existing.asset.volatility(),
                        asset.expected_return(),
                        asset.volatility()
                    )));
                }
                existing.quantity += quantity;
            }
        }
        Ok(())
    }

    /// Remove `quantity` units of the named asset, deleting the position
    /// when nothing is left.
    ///
    /// Quantities are compared exactly. After fractional additions such as
    /// `0.1 + 0.2`, removing `0.3` leaves a remainder of about `5.5e-17` and
    /// the position stays; remove [`Position::quantity`] to close it.
    pub fn remove_position(&mut self, name: &str, quantity: f64) -> Result<()> {
        check_quantity(quantity, "remove_position")?;

        let position = self
            .positions
            .get_mut(name)
            .ok_or_else(|| PortfolioError::not_found(format!("asset {}", name)))?;

        if quantity > position.quantity {
            return Err(PortfolioError::invalid(format!(
                "cannot remove {} of {}: only {} held",
                quantity, name, position.quantity
            )));
        }

        position.quantity -= quantity;
        if position.quantity <= 0.0 {
            self.positions.remove(name);
        }
        Ok(())
    }

    /// Position for `name`, or `NotFound`.
    pub fn get(&self, name: &str) -> Result<&Position> {
        self.positions
            .get(name)
            .ok_or_else(|| PortfolioError::not_found(format!("asset {}", name)))
    }

    /// Mutable position for `name`, or `NotFound`.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Position> {
        self.positions
            .get_mut(name)
            .ok_or_else(|| PortfolioError::not_found(format!("asset {}", name)))
    }

    /// Update the stored price of an asset.
    pub fn set_price(&mut self, name: &str, price: f64) -> Result<()> {
        self.get_mut(name)?.asset.set_price(price)
    }

    /// Positions in asset order.
    pub fn positions(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(name, p)| (name.as_str(), p))
    }

    /// Copy of `self` with every position of `other` added through
    /// [`Portfolio::add_position`]. Entries already in `self` keep their price.
    pub fn merge(&self, other: &Portfolio) -> Result<Portfolio> {
        let mut out = self.clone();
        for position in other.positions.values() {
            out.add_position(position.asset.clone(), position.quantity)?;
        }
        Ok(out)
    }

    /// In-place [`Portfolio::merge`]. On failure `self` is left unchanged.
    pub fn merge_from(&mut self, other: &Portfolio) -> Result<()> {
        *self = self.merge(other)?;
        Ok(())
    }

    /// Asset names in ascending lexical order: the canonical correlation
    /// matrix order for this portfolio.
    pub fn asset_order(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    /// Sum of position values; 0 when empty.
    pub fn total_value(&self) -> f64 {
        self.positions.values().map(Position::value).sum()
    }

    /// Position values in asset order.
    pub fn values(&self) -> Vec<f64> {
        self.positions.values().map(Position::value).collect()
    }

    /// Value weights in asset order; all zeros when the total value is not positive.
    pub fn weights(&self) -> Vec<f64> {
        risk::value_weights(&self.values())
    }

    /// Asset volatilities in asset order.
    pub fn volatilities(&self) -> Vec<f64> {
        self.positions
            .values()
            .map(|p| p.asset.volatility())
            .collect()
    }

    /// Asset expected returns in asset order.
    pub fn expected_returns(&self) -> Vec<f64> {
        self.positions
            .values()
            .map(|p| p.asset.expected_return())
            .collect()
    }

    /// Value-weighted average expected return.
    ///
    /// Returns 0 when the total value is not positive: an empty or worthless
    /// portfolio has no exposure and so no return.
    pub fn expected_return(&self) -> f64 {
        let total = self.total_value();
        if total <= 0.0 {
            return 0.0;
        }
        self.positions
            .values()
            .map(|p| p.value() / total * p.asset.expected_return())
            .sum()
    }

    /// Portfolio variance under `corr`.
    ///
    /// An empty portfolio has variance 0 whatever the matrix. Otherwise the
    /// matrix must pass the validation gate for [`Portfolio::len`] assets; a
    /// portfolio whose total value is not positive then has variance 0.
    pub fn variance(&self, corr: &CorrelationMatrix) -> Result<f64> {
        Ok(self.risk_inputs(corr)?.map_or(0.0, |(w, s)| {
            risk::portfolio_variance(&w, &s, corr.rows())
        }))
    }

    /// `sqrt(max(0, variance))`.
    pub fn volatility(&self, corr: &CorrelationMatrix) -> Result<f64> {
        Ok(risk::volatility_from_variance(self.variance(corr)?))
    }

    /// Per-asset variance contributions in asset order. They sum to
    /// [`Portfolio::variance`]; all zeros for an empty or worthless portfolio.
    pub fn variance_contributions(&self, corr: &CorrelationMatrix) -> Result<Vec<f64>> {
        Ok(match self.risk_inputs(corr)? {
            Some((w, s)) => risk::variance_contributions(&w, &s, corr.rows()),
            None => vec![0.0; self.len()],
        })
    }

    /// Full statistics snapshot under `corr`.
    pub fn risk_report(&self, corr: &CorrelationMatrix) -> Result<RiskReport> {
        let variance = self.variance(corr)?;
        let contributions = self.variance_contributions(corr)?;
        let positions: Vec<&Position> = self.positions.values().collect();

        Ok(RiskReport {
            asset_order: self.asset_order(),
            quantities: positions.iter().map(|p| p.quantity).collect(),
            prices: positions.iter().map(|p| p.asset.price()).collect(),
            expected_returns: self.expected_returns(),
            volatilities: self.volatilities(),
            values: self.values(),
            weights: self.weights(),
            total_value: self.total_value(),
            expected_return: self.expected_return(),
            variance,
            volatility: risk::volatility_from_variance(variance),
            risk_shares: risk::risk_shares(&contributions, variance),
            contributions,
        })
    }

    /// Validate `corr` and return `(weights, volatilities)` in asset order,
    /// or `None` when there is no exposure to compute risk on.
    fn risk_inputs(&self, corr: &CorrelationMatrix) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.check_matrix(corr)?;

        if self.total_value() <= 0.0 {
            return Ok(None);
        }
        Ok(Some((self.weights(), self.volatilities())))
    }

    fn check_matrix(&self, corr: &CorrelationMatrix) -> Result<()> {
        corr.validate(self.len())?;
        if let Some(labels) = corr.labels() {
            if !labels.iter().eq(self.positions.keys()) {
                return Err(PortfolioError::invalid(format!(
                    "correlation matrix labels {:?} do not match asset order {:?}",
                    labels,
                    self.asset_order()
                )));
            }
        }
        Ok(())
    }
}

impl Add<&Portfolio> for &Portfolio {
    type Output = Result<Portfolio>;

    fn add(self, rhs: &Portfolio) -> Self::Output {
        self.merge(rhs)
    }
}

fn check_quantity(quantity: f64, context: &str) -> Result<()> {
    if quantity > 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::invalid(format!(
            "{}: quantity must be > 0, got {}",
            context, quantity
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str, price: f64, mu: f64, sigma: f64) -> Asset {
        Asset::new(name, price, mu, sigma).unwrap()
    }

    fn sample_portfolio() -> Portfolio {
        let mut p = Portfolio::new();
        p.add_position(asset("AAPL", 200.0, 0.10, 0.20), 10.0).unwrap();
        p.add_position(asset("BOND", 100.0, 0.02, 0.05), 20.0).unwrap();
        p
    }

    #[test]
    fn test_remove_after_fractional_additions() {
        let mut p = Portfolio::new();
        p.add_position(asset("GOLD", 1800.0, 0.03, 0.15), 0.1).unwrap();
        p.add_position(asset("GOLD", 1800.0, 0.03, 0.15), 0.2).unwrap();

        p.remove_position("GOLD", 0.3).unwrap();
        assert_eq!(p.len(), 1);
        let rest = p.get("GOLD").unwrap().quantity();
        assert!(rest > 0.0 && rest < 1e-15);

        p.remove_position("GOLD", rest).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_position_requires_positive_quantity() {
        let a = asset("AAPL", 200.0, 0.09, 0.25);
        assert!(Position::new(a.clone(), 0.0).is_err());
        assert!(Position::new(a.clone(), -1.0).is_err());
        let p = Position::new(a, 2.5).unwrap();
        assert_eq!(p.value(), 500.0);
    }

    #[test]
    fn test_add_and_remove_validation() {
        let mut p = Portfolio::new();
        let a = asset("AAPL", 200.0, 0.09, 0.25);
        assert!(matches!(
            p.add_position(a.clone(), 0.0),
            Err(PortfolioError::InvalidArgument(_))
        ));
        p.add_position(a, 10.0).unwrap();

        assert!(matches!(
            p.remove_position("AAPL", 0.0),
            Err(PortfolioError::InvalidArgument(_))
        ));
        assert!(matches!(
            p.remove_position("MSFT", 1.0),
            Err(PortfolioError::NotFound(_))
        ));
        assert!(matches!(
            p.remove_position("AAPL", 100.0),
            Err(PortfolioError::InvalidArgument(_))
        ));
        assert_eq!(p.get("AAPL").unwrap().quantity(), 10.0);

        p.remove_position("AAPL", 10.0).unwrap();
        assert_eq!(p.len(), 0);
        assert!(!p.contains("AAPL"));
    }

    #[test]
    fn test_partial_remove() {
        let mut p = sample_portfolio();
        p.remove_position("BOND", 5.0).unwrap();
        assert_eq!(p.get("BOND").unwrap().quantity(), 15.0);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_aggregation_keeps_existing_price() {
        let mut p = Portfolio::new();
        p.add_position(asset("AAPL", 100.0, 0.10, 0.20), 5.0).unwrap();
        p.add_position(asset("AAPL", 150.0, 0.10, 0.20), 3.0).unwrap();

        let pos = p.get("AAPL").unwrap();
        assert_eq!(pos.quantity(), 8.0);
        assert_eq!(pos.asset().price(), 100.0);
        assert_eq!(p.total_value(), 800.0);
    }

    #[test]
    fn test_parameter_mismatch() {
        let mut p = Portfolio::new();
        p.add_position(asset("AAPL", 100.0, 0.10, 0.20), 5.0).unwrap();

        assert!(matches!(
            p.add_position(asset("AAPL", 101.0, 0.11, 0.20), 1.0),
            Err(PortfolioError::InvalidArgument(_))
        ));
        assert!(matches!(
            p.add_position(asset("AAPL", 102.0, 0.10, 0.25), 1.0),
            Err(PortfolioError::InvalidArgument(_))
        ));
        // Rejected additions leave the portfolio untouched.
        assert_eq!(p.get("AAPL").unwrap().quantity(), 5.0);

        // Differences within 1e-12 are accepted.
        p.add_position(asset("AAPL", 100.0, 0.10 + 1e-13, 0.20), 1.0)
            .unwrap();
        assert_eq!(p.get("AAPL").unwrap().quantity(), 6.0);
    }

    #[test]
    fn test_get_missing() {
        let p = sample_portfolio();
        assert!(matches!(p.get("MISSING"), Err(PortfolioError::NotFound(_))));
        assert!(matches!(
            Portfolio::new().get("MISSING"),
            Err(PortfolioError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_price() {
        let mut p = sample_portfolio();
        p.set_price("AAPL", 300.0).unwrap();
        assert_eq!(p.total_value(), 5000.0);
        assert!(p.set_price("AAPL", -1.0).is_err());
        assert!(matches!(
            p.set_price("NOPE", 1.0),
            Err(PortfolioError::NotFound(_))
        ));

        p.get_mut("BOND").unwrap().asset_mut().set_price(50.0).unwrap();
        assert_eq!(p.get("BOND").unwrap().value(), 1000.0);
    }

    #[test]
    fn test_asset_order_is_lexical() {
        let mut p = Portfolio::new();
        for name in ["MSFT", "AAPL", "BOND", "Zeta", "aapl"] {
            p.add_position(asset(name, 10.0, 0.05, 0.1), 1.0).unwrap();
        }
        assert_eq!(p.asset_order(), vec!["AAPL", "BOND", "MSFT", "Zeta", "aapl"]);
    }

    #[test]
    fn test_expected_return() {
        let p = sample_portfolio();
        assert_eq!(p.total_value(), 4000.0);
        assert!((p.expected_return() - 0.06).abs() < 1e-12);
        assert_eq!(p.weights(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_empty_portfolio_conventions() {
        let p = Portfolio::new();
        assert_eq!(p.total_value(), 0.0);
        assert_eq!(p.expected_return(), 0.0);
        // Any matrix, even malformed, yields zero risk for an empty portfolio.
        let junk = CorrelationMatrix::new(vec![vec![5.0, 1.0]]);
        assert_eq!(p.variance(&junk).unwrap(), 0.0);
        assert_eq!(p.volatility(&junk).unwrap(), 0.0);
        assert!(p.variance_contributions(&junk).unwrap().is_empty());
    }

    #[test]
    fn test_zero_value_portfolio() {
        let mut p = Portfolio::new();
        p.add_position(asset("FREE", 0.0, 0.1, 0.3), 4.0).unwrap();
        assert_eq!(p.expected_return(), 0.0);
        assert_eq!(p.weights(), vec![0.0]);

        let id = CorrelationMatrix::identity(1);
        assert_eq!(p.variance(&id).unwrap(), 0.0);
        assert_eq!(p.variance_contributions(&id).unwrap(), vec![0.0]);

        // The matrix is still checked.
        assert!(p.variance(&CorrelationMatrix::identity(2)).is_err());
    }

    #[test]
    fn test_sample_variance_identity() {
        let p = sample_portfolio();
        let id = CorrelationMatrix::identity(2);
        let v = p.variance(&id).unwrap();
        assert!((v - 0.010625).abs() < 1e-12);
        assert!((p.volatility(&id).unwrap() - 0.010625f64.sqrt()).abs() < 1e-12);
        assert!((p.volatility(&id).unwrap() - 0.10308).abs() < 1e-5);

        let c = p.variance_contributions(&id).unwrap();
        assert!((c[0] - 0.01).abs() < 1e-12);
        assert!((c[1] - 0.000625).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_validation_scenarios() {
        let p = sample_portfolio();
        let bad = [
            CorrelationMatrix::new(vec![vec![1.0, 0.0]]),
            CorrelationMatrix::new(vec![vec![0.9, 0.0], vec![0.0, 1.0]]),
            CorrelationMatrix::new(vec![vec![1.0, 1.2], vec![1.2, 1.0]]),
            CorrelationMatrix::new(vec![vec![1.0, 0.3], vec![0.2, 1.0]]),
        ];
        for m in &bad {
            assert!(matches!(
                p.variance(m),
                Err(PortfolioError::InvalidArgument(_))
            ));
            assert!(p.volatility(m).is_err());
            assert!(p.variance_contributions(m).is_err());
        }
    }

    #[test]
    fn test_labeled_matrix_must_match_order() {
        let p = sample_portfolio();
        let rows = vec![vec![1.0, 0.3], vec![0.3, 1.0]];

        let good = CorrelationMatrix::with_labels(vec!["AAPL".into(), "BOND".into()], rows.clone());
        assert!(p.variance(&good).is_ok());

        let swapped = CorrelationMatrix::with_labels(vec!["BOND".into(), "AAPL".into()], rows);
        assert!(matches!(
            p.variance(&swapped),
            Err(PortfolioError::InvalidArgument(_))
        ));
        let aligned = swapped.aligned_to(&p.asset_order()).unwrap();
        assert!(p.variance(&aligned).is_ok());
    }

    #[test]
    fn test_merge() {
        let a = sample_portfolio();
        let mut b = Portfolio::new();
        b.add_position(asset("AAPL", 999.0, 0.10, 0.20), 5.0).unwrap();
        b.add_position(asset("DEMO_A", 100.0, 0.05, 0.10), 1.0).unwrap();

        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("AAPL").unwrap().quantity(), 15.0);
        assert_eq!(merged.get("AAPL").unwrap().asset().price(), 200.0);
        assert_eq!(merged.get("DEMO_A").unwrap().quantity(), 1.0);

        // Operands are untouched.
        assert_eq!(a.get("AAPL").unwrap().quantity(), 10.0);
        assert_eq!(b.len(), 2);

        // The other direction keeps b's price.
        let reversed = (&b + &a).unwrap();
        assert_eq!(reversed.get("AAPL").unwrap().asset().price(), 999.0);
    }

    #[test]
    fn test_merge_mismatch_is_all_or_nothing() {
        let mut a = sample_portfolio();
        let mut b = Portfolio::new();
        b.add_position(asset("AAA", 1.0, 0.0, 0.0), 1.0).unwrap();
        b.add_position(asset("BOND", 100.0, 0.03, 0.05), 1.0).unwrap();

        assert!(a.merge(&b).is_err());
        assert!(a.merge_from(&b).is_err());
        assert_eq!(a, sample_portfolio());
    }

    #[test]
    fn test_merged_copies_are_independent() {
        let a = sample_portfolio();
        let mut merged = a.merge(&Portfolio::new()).unwrap();
        merged.set_price("AAPL", 1.0).unwrap();
        assert_eq!(a.get("AAPL").unwrap().asset().price(), 200.0);
    }

    #[test]
    fn test_risk_report() {
        let p = sample_portfolio();
        let report = p.risk_report(&CorrelationMatrix::identity(2)).unwrap();
        assert_eq!(report.asset_order, vec!["AAPL", "BOND"]);
        assert_eq!(report.total_value, 4000.0);
        assert!((report.expected_return - 0.06).abs() < 1e-12);
        let shares = report.risk_shares.clone().unwrap();
        assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(report.largest_contributor().unwrap().0, "AAPL");
    }
}
