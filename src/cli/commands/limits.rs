//! `sigstat limits` command - manage specification limits

use clap::Subcommand;
use console::style;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::cli::helpers::{format_value, open_store};
use crate::cli::table::{render_structured, Table};
use crate::cli::GlobalOpts;
use crate::core::limits::read_limits_csv;
use crate::core::store::RowOutcome;

#[derive(Subcommand, Debug)]
pub enum LimitsCommands {
    /// Import limits from a CSV file (columns: sku, lsl, usl)
    Import {
        /// CSV file to import
        file: PathBuf,
    },

    /// Set the limits for one SKU (an omitted bound is cleared)
    Set {
        /// SKU to update
        sku: String,

        /// Lower specification limit
        #[arg(long, allow_negative_numbers = true)]
        lsl: Option<f64>,

        /// Upper specification limit
        #[arg(long, allow_negative_numbers = true)]
        usl: Option<f64>,
    },

    /// List stored limits
    List,
}

pub fn run(cmd: LimitsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LimitsCommands::Import { file } => run_import(&file, global),
        LimitsCommands::Set { sku, lsl, usl } => run_set(&sku, lsl, usl, global),
        LimitsCommands::List => run_list(global),
    }
}

fn run_import(file: &Path, global: &GlobalOpts) -> Result<()> {
    let config = super::setup(global)?;
    let rows = read_limits_csv(file)?;
    let mut store = open_store(&config)?;
    let stats = store.import_limits(&rows)?;

    if let Some(out) = render_structured(&stats, global.format)? {
        print!("{}", out);
        return Ok(());
    }

    println!(
        "{} Imported limits for {} SKU(s) into '{}'",
        style("✓").green(),
        stats.rows_processed,
        style(store.limits_table()).cyan()
    );
    if !global.quiet {
        println!("  New:     {}", style(stats.inserted).green());
        println!("  Updated: {}", style(stats.updated).yellow());
    }
    Ok(())
}

fn run_set(sku: &str, lsl: Option<f64>, usl: Option<f64>, global: &GlobalOpts) -> Result<()> {
    if let (Some(l), Some(u)) = (lsl, usl) {
        if l > u {
            return Err(miette::miette!(
                help = "Swap --lsl and --usl",
                "LSL {} is above USL {} for SKU '{}'",
                l,
                u,
                sku
            ));
        }
    }
    if lsl.is_none() && usl.is_none() {
        log::warn!("No limits given for '{}'; both bounds will be cleared", sku);
    }

    let config = super::setup(global)?;
    let mut store = open_store(&config)?;
    let outcome = store.put_limits(sku, lsl, usl)?;

    let verb = match outcome {
        RowOutcome::Inserted => "Added",
        _ => "Updated",
    };
    println!(
        "{} {} limits for {}: LSL {}, USL {}",
        style("✓").green(),
        verb,
        style(sku).cyan(),
        format_value(lsl),
        format_value(usl)
    );
    Ok(())
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let config = super::setup(global)?;
    let store = open_store(&config)?;
    let rows = store.load_limits()?.to_rows();

    if let Some(out) = render_structured(&rows, global.format)? {
        print!("{}", out);
        return Ok(());
    }

    if rows.is_empty() {
        if !global.quiet {
            println!("No limits stored in '{}'", store.limits_table());
        }
        return Ok(());
    }

    let mut table = Table::new(&["sku", "lsl", "usl"]);
    for row in &rows {
        table.push_row(vec![
            row.sku.clone(),
            format_value(row.lsl),
            format_value(row.usl),
        ]);
    }
    print!("{}", table.render(global.format));
    Ok(())
}
