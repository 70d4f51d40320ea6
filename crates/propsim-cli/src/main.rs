mod commands;
mod input;
mod output;
mod telemetry;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::amortize::AmortizeArgs;
use commands::payoff::{CompareArgs, PayoffArgs};
use commands::property::{AnalyzeArgs, ScoreArgs};
use commands::scenarios::{MonteCarloArgs, SensitivityArgs};

/// House-hacking deal scoring and debt-payoff scenario analysis
#[derive(Parser)]
#[command(
    name = "propsim",
    version,
    about = "House-hacking deal scoring and debt-payoff scenario analysis",
    long_about = "A CLI around the propsim engine. Scores rental properties under a \
                  two-regime (owner-occupied, then fully rented) model, projects \
                  hold-period returns, and simulates paying down debt versus investing."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "propsim_core=trace")
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Metrics, deal score and projections for one property
    Analyze(AnalyzeArgs),
    /// Score a batch of properties, best deal first
    Score(ScoreArgs),
    /// Fixed-rate mortgage payment and optional schedule
    Amortize(AmortizeArgs),
    /// Simulate one debt-payoff strategy
    Payoff(PayoffArgs),
    /// Compare two debt-payoff strategies
    Compare(CompareArgs),
    /// Sweep the assumed market return across two strategies
    Sensitivity(SensitivityArgs),
    /// Monte Carlo comparison of two strategies under random monthly returns
    MonteCarlo(MonteCarloArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init(&cli.log_level) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::property::run_analyze(args),
        Commands::Score(args) => commands::property::run_score(args),
        Commands::Amortize(args) => commands::amortize::run_amortize(args),
        Commands::Payoff(args) => commands::payoff::run_payoff(args),
        Commands::Compare(args) => commands::payoff::run_compare(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args),
        Commands::MonteCarlo(args) => commands::scenarios::run_monte_carlo(args),
        Commands::Version => {
            println!("propsim {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
