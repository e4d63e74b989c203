//! `sigstat init` command - write a default config and create the table

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::core::config::PROJECT_CONFIG_FILE;
use crate::core::limits::read_limits_csv;
use crate::core::{Config, SpecStore};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Import specification limits from a CSV file (sku,lsl,usl)
    #[arg(long)]
    pub limits: Option<PathBuf>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let config_path = global
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));

    if config_path.exists() && !args.force {
        println!(
            "{} Config already exists at {}",
            style("!").yellow(),
            style(config_path.display()).cyan()
        );
    } else {
        std::fs::write(&config_path, Config::default_file_contents()).into_diagnostic()?;
        println!(
            "{} Created {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    }

    let config = super::setup(global)?;
    let mut store = SpecStore::from_config(&config)?;
    let existed = store.has_schema()?;
    store.init_schema()?;
    println!(
        "{} Specification table '{}' {} in {}",
        style("✓").green(),
        style(store.table()).cyan(),
        if existed { "already present" } else { "created" },
        style(store.path().display()).cyan()
    );

    if let Some(path) = &args.limits {
        let rows = read_limits_csv(path)?;
        let stats = store.import_limits(&rows)?;
        println!(
            "{} Imported limits for {} SKU(s) ({} new, {} updated)",
            style("✓").green(),
            stats.rows_processed,
            style(stats.inserted).green(),
            style(stats.updated).yellow()
        );
    }

    if !global.quiet {
        println!();
        println!("Next steps:");
        if args.limits.is_none() {
            println!(
                "  {} Load specification limits",
                style("sigstat limits import limits.csv").yellow()
            );
        }
        println!(
            "  {} Compute and store statistics",
            style("sigstat run --measurements measurements.csv").yellow()
        );
        println!(
            "  {} Review stored statistics",
            style("sigstat report").yellow()
        );
    }

    Ok(())
}
