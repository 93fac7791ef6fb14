mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::dpd::DpdArgs;
use commands::lifecycle::LifecycleArgs;
use commands::pricing::BandArgs;
use commands::report::ReportArgs;

/// Commercial lending portfolio risk and KPI reports
#[derive(Parser)]
#[command(
    name = "lrisk",
    version,
    about = "Commercial lending portfolio risk and KPI reports",
    long_about = "A CLI for computing commercial lending portfolio KPIs with decimal \
                  precision: delinquency aging, pricing-grid lookups, weighted yield, \
                  concentration risk, NPL status, and client lifecycle."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full portfolio report for a reference date
    Report(ReportArgs),
    /// Compute days past due for a single loan
    Dpd(DpdArgs),
    /// Look up the pricing band for a (tenor, amount, product) triple
    Band(BandArgs),
    /// Classify client relationship lifecycle over a reporting window
    Lifecycle(LifecycleArgs),
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

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Report(args) => commands::report::run_report(args),
        Commands::Dpd(args) => commands::dpd::run_dpd(args),
        Commands::Band(args) => commands::pricing::run_band(args),
        Commands::Lifecycle(args) => commands::lifecycle::run_lifecycle(args),
        Commands::Version => {
            println!("lrisk {}", env!("CARGO_PKG_VERSION"));
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
