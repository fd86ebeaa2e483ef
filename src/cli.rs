//! Command-line interface for portfolio bookkeeping and risk reports.

use folio::analytics::ReportFormatter;
use folio::config::FolioFileConfig;
use folio::correlation::{parse_matrix_text, CorrelationMatrix};
use folio::error::{PortfolioError, Result};
use folio::export::{export_csv, export_csv_string, import_csv};
use folio::market_data::{CsvPriceProvider, MarketDataProvider};
use folio::portfolio::Portfolio;
use folio::risk::RiskReport;
use folio::Asset;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Folio - portfolio positions and mean-variance risk from the command line.
#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Track portfolio positions and compute mean-variance risk statistics")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show positions, values and weights
    Show {
        /// Positions CSV file (name,price,mu,sigma,qty)
        #[arg(short, long)]
        portfolio: PathBuf,
    },

    /// Compute the risk report for a positions file
    #[command(group(ArgGroup::new("correlation").args(["matrix", "identity", "market_dir"])))]
    Risk {
        /// Positions CSV file
        #[arg(short, long)]
        portfolio: PathBuf,

        /// Correlation matrix text file, rows in asset order
        #[arg(short, long)]
        matrix: Option<PathBuf>,

        /// Treat assets as uncorrelated (default)
        #[arg(long)]
        identity: bool,

        /// Estimate correlations from <TICKER>.csv price histories in this directory
        #[arg(long)]
        market_dir: Option<PathBuf>,

        /// Decimal places in the text report
        #[arg(long, default_value = "4")]
        precision: usize,
    },

    /// Add a position and write the file back
    Add {
        /// Positions CSV file (created if missing)
        #[arg(short, long)]
        portfolio: PathBuf,

        /// Asset name
        #[arg(long)]
        name: String,

        /// Unit price
        #[arg(long)]
        price: f64,

        /// Expected annual return
        #[arg(long, allow_negative_numbers = true)]
        mu: f64,

        /// Annual volatility
        #[arg(long)]
        sigma: f64,

        /// Quantity to add
        #[arg(long)]
        qty: f64,
    },

    /// Remove part or all of a position and write the file back
    Remove {
        /// Positions CSV file
        #[arg(short, long)]
        portfolio: PathBuf,

        /// Asset name
        #[arg(long)]
        name: String,

        /// Quantity to remove
        #[arg(long)]
        qty: f64,
    },

    /// Merge two positions files
    Merge {
        /// Positions CSV file
        #[arg(short, long)]
        portfolio: PathBuf,

        /// Positions CSV file to merge in
        #[arg(short, long)]
        with: PathBuf,

        /// Write the merged positions here instead of printing them
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Add a position priced from a price history
    Fetch {
        /// Positions CSV file (created if missing)
        #[arg(short, long)]
        portfolio: PathBuf,

        /// Directory holding <TICKER>.csv price histories
        #[arg(long)]
        market_dir: PathBuf,

        /// Ticker to fetch
        #[arg(short, long)]
        ticker: String,

        /// Quantity to add
        #[arg(long)]
        qty: f64,
    },

    /// Print the correlation matrix of daily log-returns
    Correlate {
        /// Directory holding <TICKER>.csv price histories
        #[arg(long)]
        market_dir: PathBuf,

        /// Tickers, in the row order of the printed matrix
        #[arg(short, long = "ticker", required = true, num_args = 1..)]
        tickers: Vec<String>,

        /// Decimal places
        #[arg(long, default_value = "4")]
        precision: usize,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "folio.toml")]
        output: PathBuf,
    },

    /// Compute a risk report from a configuration file
    RunConfig {
        /// Path to TOML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("Warning: a tracing subscriber is already installed");
        }
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Show { portfolio } => show(portfolio, cli.output),

        Commands::Risk {
            portfolio,
            matrix,
            identity: _,
            market_dir,
            precision,
        } => {
            let portfolio = import_csv(portfolio)?;
            let corr = load_correlation(&portfolio, matrix.as_deref(), market_dir.as_deref())?;
            let report = portfolio.risk_report(&corr)?;
            print_report(&report, cli.output, *precision);
            Ok(())
        }

        Commands::Add {
            portfolio,
            name,
            price,
            mu,
            sigma,
            qty,
        } => add_position(portfolio, Asset::new(name.as_str(), *price, *mu, *sigma)?, *qty),

        Commands::Remove {
            portfolio,
            name,
            qty,
        } => remove_position(portfolio, name, *qty),

        Commands::Merge {
            portfolio,
            with,
            out,
        } => {
            let merged = import_csv(portfolio)?.merge(&import_csv(with)?)?;
            match out {
                Some(path) => {
                    export_csv(&merged, path)?;
                    println!("Wrote {} positions to {}", merged.len(), path.display());
                    Ok(())
                }
                None => print_portfolio(&merged, cli.output),
            }
        }

        Commands::Fetch {
            portfolio,
            market_dir,
            ticker,
            qty,
        } => {
            let asset = CsvPriceProvider::new(market_dir).fetch_asset(ticker)?;
            info!(
                "Fetched {}: price {:.2}, mu {:.4}, sigma {:.4}",
                asset.name(),
                asset.price(),
                asset.expected_return(),
                asset.volatility()
            );
            add_position(portfolio, asset, *qty)
        }

        Commands::Correlate {
            market_dir,
            tickers,
            precision,
        } => {
            let matrix = CsvPriceProvider::new(market_dir).correlation_matrix(tickers)?;
            match cli.output {
                OutputFormat::Text => {
                    println!("{}", ReportFormatter::format_matrix(&matrix, *precision))
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matrix)?),
                OutputFormat::Csv => println!("{}", matrix_csv(&matrix)),
            }
            Ok(())
        }

        Commands::Init { output } => init_config(output),

        Commands::RunConfig { config } => run_from_config(config, cli.output),
    }
}

/// Positions file contents, or an empty portfolio when the file does not
/// exist yet.
fn load_or_new(path: &Path) -> Result<Portfolio> {
    if !path.exists() {
        debug!("{} does not exist, starting empty", path.display());
        return Ok(Portfolio::new());
    }
    import_csv(path)
}

fn show(path: &Path, output: OutputFormat) -> Result<()> {
    print_portfolio(&load_or_new(path)?, output)
}

fn print_portfolio(portfolio: &Portfolio, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Text => ReportFormatter::print_positions(portfolio, 4),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(portfolio)?),
        OutputFormat::Csv => print!("{}", export_csv_string(portfolio)?),
    }
    Ok(())
}

fn add_position(path: &Path, asset: Asset, quantity: f64) -> Result<()> {
    let mut portfolio = load_or_new(path)?;
    let name = asset.name().to_string();
    portfolio.add_position(asset, quantity)?;
    export_csv(&portfolio, path)?;
    println!(
        "Added {} x {} ({} positions)",
        quantity,
        name,
        portfolio.len()
    );
    Ok(())
}

fn remove_position(path: &Path, name: &str, quantity: f64) -> Result<()> {
    let mut portfolio = load_or_new(path)?;
    portfolio.remove_position(name, quantity)?;
    export_csv(&portfolio, path)?;
    println!(
        "Removed {} x {} ({} positions)",
        quantity,
        name,
        portfolio.len()
    );
    Ok(())
}

fn load_correlation(
    portfolio: &Portfolio,
    matrix: Option<&Path>,
    market_dir: Option<&Path>,
) -> Result<CorrelationMatrix> {
    if let Some(path) = matrix {
        info!("Loading correlation matrix from: {}", path.display());
        return parse_matrix_text(&fs::read_to_string(path)?);
    }
    if let Some(dir) = market_dir {
        info!("Estimating correlations from: {}", dir.display());
        return CsvPriceProvider::new(dir).correlation_matrix(&portfolio.asset_order());
    }
    Ok(CorrelationMatrix::identity(portfolio.len()))
}

fn print_report(report: &RiskReport, output: OutputFormat, precision: usize) {
    match output {
        OutputFormat::Text => ReportFormatter::print_report(report, precision),
        OutputFormat::Json => println!("{}", ReportFormatter::to_json(report)),
        OutputFormat::Csv => print!("{}", ReportFormatter::to_csv(report)),
    }
}

fn matrix_csv(matrix: &CorrelationMatrix) -> String {
    let mut out = String::new();
    if let Some(labels) = matrix.labels() {
        out.push_str(&format!(",{}\n", labels.join(",")));
    }
    for (i, row) in matrix.rows().iter().enumerate() {
        if let Some(labels) = matrix.labels() {
            out.push_str(&labels[i]);
            out.push(',');
        }
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&values.join(","));
        out.push('\n');
    }
    out
}

fn init_config(output: &Path) -> Result<()> {
    let example = FolioFileConfig::example();
    fs::write(output, example)?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file to point at your positions, then run:");
    println!("  folio run-config -c {}", output.display());
    Ok(())
}

fn run_from_config(config_path: &Path, output: OutputFormat) -> Result<()> {
    let file_config = FolioFileConfig::load(config_path)?;

    let output = if output == OutputFormat::Text {
        OutputFormat::from_str(&file_config.output.format, true).map_err(|_| {
            PortfolioError::ConfigError(format!(
                "Unknown output format: {}",
                file_config.output.format
            ))
        })?
    } else {
        output
    };

    let portfolio = file_config.load_portfolio()?;
    let corr = file_config.correlation_for(&portfolio)?;
    let report = portfolio.risk_report(&corr)?;
    print_report(&report, output, file_config.output.precision);
    Ok(())
}
