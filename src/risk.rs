//! Mean-variance risk engine.
//!
//! Pure functions over a weight vector, a volatility vector and a
//! correlation matrix, all indexed in the same asset order. Callers are
//! expected to have passed the matrix through the validation gate in
//! [`crate::correlation`]; these functions do not re-check it.
//!
//! For weights `w`, volatilities `s` and correlations `C`:
//!
//! - variance: `sum_i sum_j w_i * w_j * C[i][j] * s_i * s_j`
//! - contribution of asset `i`: `w_i * sum_j C[i][j] * s_i * s_j * w_j`
//!
//! Contributions sum to the variance.

use serde::{Deserialize, Serialize};

/// Portfolio variance as the full quadratic form (both triangles summed).
pub fn portfolio_variance(weights: &[f64], volatilities: &[f64], corr: &[Vec<f64>]) -> f64 {
    let n = weights.len();
    let mut variance = 0.0;
    for i in 0..n {
        let si = volatilities[i];
        for j in 0..n {
            let sj = volatilities[j];
            variance += weights[i] * weights[j] * corr[i][j] * si * sj;
        }
    }
    variance
}

/// Per-asset variance contributions: asset `i`'s weighted covariance with
/// the whole portfolio.
pub fn variance_contributions(
    weights: &[f64],
    volatilities: &[f64],
    corr: &[Vec<f64>],
) -> Vec<f64> {
    let n = weights.len();
    (0..n)
        .map(|i| {
            let si = volatilities[i];
            let cov_row_dot_w: f64 = (0..n)
                .map(|j| corr[i][j] * si * volatilities[j] * weights[j])
                .sum();
            weights[i] * cov_row_dot_w
        })
        .collect()
}

/// Standard deviation from a variance, flooring numerical-noise negatives at 0.
pub fn volatility_from_variance(variance: f64) -> f64 {
    variance.max(0.0).sqrt()
}

/// Contributions as fractions of total variance, or `None` when the
/// variance is not positive.
pub fn risk_shares(contributions: &[f64], variance: f64) -> Option<Vec<f64>> {
    if variance > 0.0 {
        Some(contributions.iter().map(|c| c / variance).collect())
    } else {
        None
    }
}

/// Value weights `value_i / total`. All zeros when the total is not positive.
pub fn value_weights(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v / total).collect()
}

/// Read-only snapshot of a portfolio's risk and return statistics, in asset order.
///
/// Renderers format these numbers directly; nothing here needs re-deriving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub asset_order: Vec<String>,
    pub quantities: Vec<f64>,
    pub prices: Vec<f64>,
    pub expected_returns: Vec<f64>,
    pub volatilities: Vec<f64>,
    pub values: Vec<f64>,
    pub weights: Vec<f64>,
    pub total_value: f64,
    pub expected_return: f64,
    pub variance: f64,
    pub volatility: f64,
    /// Raw variance contributions (sum to `variance`).
    pub contributions: Vec<f64>,
    /// Contributions divided by `variance`; absent when the variance is zero.
    pub risk_shares: Option<Vec<f64>>,
}

impl RiskReport {
    pub fn len(&self) -> usize {
        self.asset_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset_order.is_empty()
    }

    /// Asset with the largest variance contribution.
    pub fn largest_contributor(&self) -> Option<(&str, f64)> {
        self.asset_order
            .iter()
            .zip(self.contributions.iter())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, c)| (name.as_str(), *c))
    }
}
