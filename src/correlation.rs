//! Correlation matrices: validation gate, text parsing, and construction
//! from return series.
//!
//! A matrix is positional: row/column `i` refers to the `i`-th name of the
//! portfolio's asset order. A matrix may optionally carry its own labels, in
//! which case the portfolio checks them against its order before use.

use crate::error::{PortfolioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance on the unit diagonal.
pub const DIAGONAL_TOLERANCE: f64 = 1e-10;
/// Tolerance on `|C[i][j] - C[j][i]|`.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;
/// Minimum aligned series length for [`CorrelationMatrix::from_return_series`].
pub const MIN_ALIGNED_RETURNS: usize = 20;

/// Square correlation matrix, optionally labeled with asset names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
    rows: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Wrap raw rows. Nothing is checked until [`CorrelationMatrix::validate`].
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { labels: None, rows }
    }

    /// Wrap raw rows together with the asset names they are indexed by.
    pub fn with_labels(labels: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            labels: Some(labels),
            rows,
        }
    }

    /// The `n x n` identity (uncorrelated assets).
    pub fn identity(n: usize) -> Self {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self::new(rows)
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.rows.get(i).and_then(|row| row.get(j)).copied()
    }

    /// Check the matrix against an expected dimension `n`.
    ///
    /// Rejects (never repairs) a matrix that is not `n x n`, has a diagonal
    /// entry more than 1e-10 away from 1, has an entry outside `[-1, 1]`, or
    /// is not symmetric within 1e-10. Labels, when present, must number `n`.
    pub fn validate(&self, n: usize) -> Result<()> {
        validate_correlation_rows(&self.rows, n)?;
        if let Some(labels) = &self.labels {
            if labels.len() != n {
                return Err(PortfolioError::invalid(format!(
                    "correlation matrix has {} labels for {} rows",
                    labels.len(),
                    n
                )));
            }
        }
        Ok(())
    }

    /// Reorder a labeled matrix so that row/column `i` refers to `order[i]`.
    ///
    /// Fails with `InvalidArgument` for an unlabeled matrix, duplicate
    /// labels, or a size mismatch, and with `NotFound` when a name of
    /// `order` has no row.
    pub fn aligned_to(&self, order: &[String]) -> Result<CorrelationMatrix> {
        let labels = self.labels.as_ref().ok_or_else(|| {
            PortfolioError::invalid("cannot align an unlabeled correlation matrix")
        })?;
        if labels.len() != order.len() || self.rows.len() != order.len() {
            return Err(PortfolioError::invalid(format!(
                "correlation matrix covers {} assets, expected {}",
                labels.len(),
                order.len()
            )));
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.as_str(), i).is_some() {
                return Err(PortfolioError::invalid(format!(
                    "duplicate correlation label: {}",
                    label
                )));
            }
        }

        let positions = order
            .iter()
            .map(|name| {
                index.get(name.as_str()).copied().ok_or_else(|| {
                    PortfolioError::not_found(format!("no correlation row for asset {}", name))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut rows = Vec::with_capacity(order.len());
        for &src_i in &positions {
            let src_row = &self.rows[src_i];
            let mut row = Vec::with_capacity(order.len());
            for &src_j in &positions {
                let value = src_row.get(src_j).copied().ok_or_else(|| {
                    PortfolioError::invalid(format!(
                        "correlation matrix row {} has {} columns",
                        src_i,
                        src_row.len()
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        Ok(CorrelationMatrix::with_labels(order.to_vec(), rows))
    }

    /// Build a matrix from per-asset return series, using the pairwise
    /// Pearson correlation of the aligned tails.
    ///
    /// Every series is trimmed to the last `min_len` values, `min_len` being
    /// the shortest series length. Fails with `InsufficientData` when that
    /// length is below [`MIN_ALIGNED_RETURNS`].
    pub fn from_return_series(series: &[Vec<f64>]) -> Result<CorrelationMatrix> {
        Self::from_return_series_with_min(series, MIN_ALIGNED_RETURNS)
    }

    /// [`CorrelationMatrix::from_return_series`] with an explicit minimum length.
    pub fn from_return_series_with_min(
        series: &[Vec<f64>],
        min_aligned: usize,
    ) -> Result<CorrelationMatrix> {
        let n = series.len();
        if n == 0 {
            return Ok(CorrelationMatrix::default());
        }

        let min_len = series.iter().map(Vec::len).min().unwrap_or(0);
        if min_len < min_aligned.max(2) {
            return Err(PortfolioError::InsufficientData {
                required: min_aligned.max(2),
                available: min_len,
            });
        }

        let aligned: Vec<&[f64]> = series.iter().map(|s| &s[s.len() - min_len..]).collect();

        let mut rows = vec![vec![0.0; n]; n];
        for i in 0..n {
            rows[i][i] = 1.0;
            for j in (i + 1)..n {
                let c = pearson(aligned[i], aligned[j])?.clamp(-1.0, 1.0);
                rows[i][j] = c;
                rows[j][i] = c;
            }
        }

        Ok(CorrelationMatrix::new(rows))
    }
}

impl From<Vec<Vec<f64>>> for CorrelationMatrix {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        CorrelationMatrix::new(rows)
    }
}

/// Validation gate on raw rows; see [`CorrelationMatrix::validate`].
pub fn validate_correlation_rows(rows: &[Vec<f64>], n: usize) -> Result<()> {
    if rows.len() != n {
        return Err(PortfolioError::invalid(format!(
            "correlation matrix has {} rows, expected {}",
            rows.len(),
            n
        )));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n {
            return Err(PortfolioError::invalid(format!(
                "correlation matrix row {} has {} columns, expected {}",
                i,
                row.len(),
                n
            )));
        }
    }

    let in_range = |c: f64| (-1.0..=1.0).contains(&c);

    for i in 0..n {
        let d = rows[i][i];
        if d.is_nan() || (d - 1.0).abs() > DIAGONAL_TOLERANCE {
            return Err(PortfolioError::invalid(format!(
                "correlation matrix diagonal must be 1, got {} at [{}][{}]",
                d, i, i
            )));
        }
        for j in (i + 1)..n {
            let a = rows[i][j];
            let b = rows[j][i];
            if !in_range(a) || !in_range(b) {
                return Err(PortfolioError::invalid(format!(
                    "correlation must be in [-1, 1], got {} / {} at [{}][{}]",
                    a, b, i, j
                )));
            }
            if (a - b).abs() > SYMMETRY_TOLERANCE {
                return Err(PortfolioError::invalid(format!(
                    "correlation matrix must be symmetric: [{}][{}]={} but [{}][{}]={}",
                    i, j, a, j, i, b
                )));
            }
        }
    }
    Ok(())
}

/// Parse a matrix from text: one row per line, values separated by
/// whitespace and/or commas. Blank lines are ignored.
///
/// Only the tokens are checked here; the shape is left to the validation gate.
pub fn parse_matrix_text(text: &str) -> Result<CorrelationMatrix> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| {
                    PortfolioError::invalid(format!(
                        "matrix line {}: invalid number {:?}",
                        line_no + 1,
                        tok
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(CorrelationMatrix::new(rows))
}

/// Pearson correlation of two equally long series.
///
/// Returns 0 when either series is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return Err(PortfolioError::invalid(format!(
            "correlation needs two series of equal length >= 2, got {} and {}",
            a.len(),
            b.len()
        )));
    }

    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return Ok(0.0);
    }
    Ok(sxy / (sxx * syy).sqrt())
}
