//! Bulk import/export of portfolios and risk reports.
//!
//! # Supported Formats
//!
//! | Format | Use Case |
//! |--------|----------|
//! | CSV (`name,price,mu,sigma,qty`) | Position import/export, spreadsheet round trips |
//! | CSV (positions + `metric,value`) | Risk report for spreadsheets |
//! | JSON | Risk report for API integration |
//!
//! Import feeds every row through [`Asset::new`] and
//! [`Portfolio::add_position`], so duplicate names aggregate and conflicting
//! parameters are rejected exactly as for manual additions.

use crate::asset::Asset;
use crate::error::{PortfolioError, Result};
use crate::portfolio::Portfolio;
use crate::risk::RiskReport;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Header written by [`export_csv_string`].
pub const POSITION_HEADER: [&str; 5] = ["name", "price", "mu", "sigma", "qty"];

/// One row of the position exchange format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub name: String,
    pub price: f64,
    pub mu: f64,
    pub sigma: f64,
    pub qty: f64,
}

impl PositionRecord {
    /// Validate the record into an asset and its quantity.
    pub fn into_asset(self) -> Result<(Asset, f64)> {
        let asset = Asset::new(self.name, self.price, self.mu, self.sigma)?;
        Ok((asset, self.qty))
    }
}

/// Position records in asset order.
pub fn position_records(portfolio: &Portfolio) -> Vec<PositionRecord> {
    portfolio
        .positions()
        .map(|(name, p)| PositionRecord {
            name: name.to_string(),
            price: p.asset().price(),
            mu: p.asset().expected_return(),
            sigma: p.asset().volatility(),
            qty: p.quantity(),
        })
        .collect()
}

/// Pick `;` when the first non-blank line has more semicolons than commas.
fn detect_delimiter(text: &str) -> u8 {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let semicolons = first.matches(';').count();
    let commas = first.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn is_header(record: &StringRecord) -> bool {
    record.len() >= 5
        && record
            .get(0)
            .map(|h| h.eq_ignore_ascii_case("name") || h.eq_ignore_ascii_case("asset"))
            .unwrap_or(false)
}

fn parse_field(record: &StringRecord, idx: usize, line: u64) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("");
    raw.parse::<f64>().map_err(|_| {
        PortfolioError::invalid(format!("CSV line {}: invalid numeric value {:?}", line, raw))
    })
}

/// Parse position records from CSV text.
///
/// The delimiter is `,` or `;` (auto-detected), the `name,price,mu,sigma,qty`
/// header is optional, quoted fields are unquoted, and blank rows are
/// skipped. Columns past the fifth are ignored. Blank or header-only text
/// yields no records, which is how an empty portfolio is exported.
pub fn parse_position_records(text: &str) -> Result<Vec<PositionRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(detect_delimiter(text))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    let mut first = true;
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if first {
            first = false;
            if is_header(&record) {
                debug!("Skipping CSV header on line {}", line);
                continue;
            }
        }

        if record.len() < 5 {
            return Err(PortfolioError::invalid(format!(
                "CSV line {}: expected 5 columns (name,price,mu,sigma,qty), got {}",
                line,
                record.len()
            )));
        }

        records.push(PositionRecord {
            name: record.get(0).unwrap_or("").to_string(),
            price: parse_field(&record, 1, line)?,
            mu: parse_field(&record, 2, line)?,
            sigma: parse_field(&record, 3, line)?,
            qty: parse_field(&record, 4, line)?,
        });
    }

    Ok(records)
}

/// Build a portfolio from CSV text; see [`parse_position_records`].
pub fn import_csv_str(text: &str) -> Result<Portfolio> {
    let records = parse_position_records(text)?;
    let rows = records.len();

    let mut portfolio = Portfolio::new();
    for record in records {
        let (asset, qty) = record.into_asset()?;
        portfolio.add_position(asset, qty)?;
    }

    info!(
        "Imported {} rows into {} positions",
        rows,
        portfolio.len()
    );
    Ok(portfolio)
}

/// Build a portfolio from a CSV file.
pub fn import_csv(path: impl AsRef<Path>) -> Result<Portfolio> {
    let path = path.as_ref();
    info!("Importing portfolio from: {}", path.display());
    let text = fs::read_to_string(path)?;
    import_csv_str(&text)
}

/// Serialize positions as `name,price,mu,sigma,qty` in asset order.
pub fn export_csv_string(portfolio: &Portfolio) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(POSITION_HEADER)?;
    for record in position_records(portfolio) {
        writer.write_record(&[
            record.name,
            record.price.to_string(),
            record.mu.to_string(),
            record.sigma.to_string(),
            record.qty.to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PortfolioError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| PortfolioError::invalid(e.to_string()))
}

/// Write positions to a CSV file; see [`export_csv_string`].
pub fn export_csv(portfolio: &Portfolio, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = export_csv_string(portfolio)?;
    fs::write(path, content)?;
    info!(
        "Exported {} positions to: {}",
        portfolio.len(),
        path.display()
    );
    Ok(())
}

/// Risk report as CSV: a position table followed by a `metric,value` table.
pub fn export_report_csv_string(report: &RiskReport) -> String {
    let mut out = String::from("name,qty,price,mu,sigma,value\n");
    for i in 0..report.len() {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            report.asset_order[i],
            report.quantities[i],
            report.prices[i],
            report.expected_returns[i],
            report.volatilities[i],
            report.values[i]
        ));
    }

    out.push_str("\nmetric,value\n");
    out.push_str(&format!("total_value,{}\n", report.total_value));
    out.push_str(&format!("expected_return,{}\n", report.expected_return));
    out.push_str(&format!("variance,{}\n", report.variance));
    out.push_str(&format!("volatility,{}\n", report.volatility));
    if let Some(shares) = &report.risk_shares {
        for (name, share) in report.asset_order.iter().zip(shares) {
            out.push_str(&format!("risk_share_{},{}\n", name, share));
        }
    }
    out
}

/// Write a risk report CSV file.
pub fn export_report_csv(report: &RiskReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(export_report_csv_string(report).as_bytes())?;
    writer.flush()?;
    info!("Exported risk report to: {}", path.display());
    Ok(())
}

/// Write a risk report as pretty-printed JSON.
pub fn export_report_json(report: &RiskReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    info!("Exported risk report to: {}", path.display());
    Ok(())
}
