//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    analyze::AnalyzeArgs, init::InitArgs, limits::LimitsCommands, report::ReportArgs, run::RunArgs,
};

#[derive(Parser)]
#[command(name = "sigstat")]
#[command(author, version, about = "Process capability statistics per SKU")]
#[command(
    long_about = "Computes mean, variance, standard deviation and sigma level per SKU \
                  from raw measurements and keeps them in a SQLite specification table."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Config file (default: ./sigstat.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Statistics table name (overrides config)
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and create the specification table
    Init(InitArgs),

    /// Run the pipeline: measurements -> statistics -> specification table
    Run(RunArgs),

    /// Compute statistics for a measurement file without writing them
    Analyze(AnalyzeArgs),

    /// Specification limit management
    #[command(subcommand)]
    Limits(LimitsCommands),

    /// Stored statistics with control limits
    Report(ReportArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table on a terminal, tsv when piped
    #[default]
    Auto,
    /// Tab-separated values (for piping)
    Tsv,
    /// CSV format (for spreadsheets)
    Csv,
    /// JSON format (for programming)
    Json,
    /// YAML format
    Yaml,
    /// Markdown tables
    Md,
}
