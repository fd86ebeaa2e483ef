//! Report rendering for terminal, JSON and CSV output.

use crate::correlation::CorrelationMatrix;
use crate::export::export_report_csv_string;
use crate::portfolio::Portfolio;
use crate::risk::RiskReport;
use colored::Colorize;
use tabled::{builder::Builder, settings::Style};

/// Format risk reports and positions for display.
pub struct ReportFormatter;

impl ReportFormatter {
    /// Print a full risk report to stdout.
    pub fn print_report(report: &RiskReport, precision: usize) {
        println!("{}", Self::render_report(report, precision));
    }

    /// Render the risk report as text with colored headings.
    pub fn render_report(report: &RiskReport, precision: usize) -> String {
        let p = precision;
        let mut out = Vec::new();

        out.push(String::new());
        out.push("═".repeat(60).blue().to_string());
        out.push(" PORTFOLIO RISK ".bold().blue().to_string());
        out.push("═".repeat(60).blue().to_string());
        out.push(String::new());

        out.push("Overview".bold().underline().to_string());
        out.push(format!("  Assets:          {:>12}", report.len()));
        out.push(format!("  Total Value:     {:>12.2}", report.total_value));
        out.push(format!(
            "  Expected Return: {:>12.p$}",
            report.expected_return
        ));
        out.push(String::new());

        out.push("Risk".bold().underline().to_string());
        out.push(format!("  Variance:        {:>12.p$}", report.variance));
        out.push(format!("  Volatility:      {:>12.p$}", report.volatility));
        if let Some((name, contribution)) = report.largest_contributor() {
            out.push(format!(
                "  Top Contributor: {:>12}  ({})",
                name,
                Self::format_signed(contribution, p)
            ));
        }
        out.push(String::new());

        if !report.is_empty() {
            out.push("Positions".bold().underline().to_string());
            out.push(Self::report_table(report, p));
            out.push(String::new());
        }

        out.push("═".repeat(60).blue().to_string());
        out.join("\n")
    }

    /// Positions table with value, weight and risk decomposition.
    pub fn report_table(report: &RiskReport, precision: usize) -> String {
        let p = precision;
        let mut builder = Builder::new();
        builder.push_record([
            "Asset", "Qty", "Price", "Value", "Weight", "Mu", "Sigma", "Contribution", "Risk %",
        ]);

        for i in 0..report.len() {
            let share = report
                .risk_shares
                .as_ref()
                .map(|s| format!("{:.2}%", s[i] * 100.0))
                .unwrap_or_else(|| "-".to_string());
            builder.push_record([
                report.asset_order[i].clone(),
                format!("{}", report.quantities[i]),
                format!("{:.2}", report.prices[i]),
                format!("{:.2}", report.values[i]),
                format!("{:.p$}", report.weights[i]),
                format!("{:.p$}", report.expected_returns[i]),
                format!("{:.p$}", report.volatilities[i]),
                format!("{:.p$}", report.contributions[i]),
                share,
            ]);
        }

        builder.build().with(Style::rounded()).to_string()
    }

    /// Holdings table in asset order.
    pub fn positions_table(portfolio: &Portfolio, precision: usize) -> String {
        let p = precision;
        let weights = portfolio.weights();
        let mut builder = Builder::new();
        builder.push_record(["Asset", "Qty", "Price", "Mu", "Sigma", "Value", "Weight"]);

        for ((name, position), weight) in portfolio.positions().zip(weights) {
            let asset = position.asset();
            builder.push_record([
                name.to_string(),
                format!("{}", position.quantity()),
                format!("{:.2}", asset.price()),
                format!("{:.p$}", asset.expected_return()),
                format!("{:.p$}", asset.volatility()),
                format!("{:.2}", position.value()),
                format!("{:.p$}", weight),
            ]);
        }

        builder.build().with(Style::rounded()).to_string()
    }

    /// Print holdings with totals.
    pub fn print_positions(portfolio: &Portfolio, precision: usize) {
        if portfolio.is_empty() {
            println!("Portfolio is empty.");
            return;
        }
        println!("{}", Self::positions_table(portfolio, precision));
        println!("  Total Value:     {:.2}", portfolio.total_value());
        println!("  Asset Order:     {}", portfolio.asset_order().join(", "));
    }

    /// Render a matrix as a table with fixed precision. Labels head the rows
    /// and columns when present; otherwise indices are used.
    pub fn format_matrix(matrix: &CorrelationMatrix, precision: usize) -> String {
        let p = precision;
        let n = matrix.len();
        let labels: Vec<String> = match matrix.labels() {
            Some(labels) => labels.to_vec(),
            None => (0..n).map(|i| i.to_string()).collect(),
        };

        let mut builder = Builder::new();
        let mut header = vec![String::new()];
        header.extend(labels.iter().cloned());
        builder.push_record(header);

        for (label, row) in labels.iter().zip(matrix.rows()) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| format!("{:.p$}", v)));
            builder.push_record(record);
        }

        builder.build().with(Style::rounded()).to_string()
    }

    /// Export the report to pretty JSON.
    pub fn to_json(report: &RiskReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Export the report as CSV: positions then a `metric,value` section.
    pub fn to_csv(report: &RiskReport) -> String {
        export_report_csv_string(report)
    }

    fn format_signed(value: f64, precision: usize) -> String {
        if value >= 0.0 {
            format!("+{:.precision$}", value).green().to_string()
        } else {
            format!("{:.precision$}", value).red().to_string()
        }
    }
}
