//! `sigstat analyze` command - compute statistics without touching the store

use console::style;
use miette::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cli::helpers::{format_value, open_store};
use crate::cli::table::{render_structured, Table};
use crate::cli::GlobalOpts;
use crate::core::limits::read_limits_csv;
use crate::core::stats::{self, CapabilitySummary, SpecLimits};
use crate::core::MeasurementTable;

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Measurement CSV (columns: sku and the value column)
    pub file: PathBuf,

    /// Name of the measurement column (default from config)
    #[arg(long)]
    pub value_column: Option<String>,

    /// Limits CSV (sku,lsl,usl) used for the sigma level
    #[arg(long, conflicts_with = "limits_from_store")]
    pub limits: Option<PathBuf>,

    /// Read limits from the specification store
    #[arg(long)]
    pub limits_from_store: bool,
}

/// Statistics for one SKU
#[derive(Debug, Serialize)]
struct AnalysisRow {
    sku: String,
    count: usize,
    mean: Option<f64>,
    variance: Option<f64>,
    std_dev: Option<f64>,
    sigma_level: Option<f64>,
}

pub fn run(args: AnalyzeArgs, global: &GlobalOpts) -> Result<()> {
    let config = super::setup(global)?;
    let value_column = args.value_column.as_deref().unwrap_or(&config.value_column);
    let table = MeasurementTable::from_csv_path(&args.file, value_column)?;

    let limits = if let Some(path) = &args.limits {
        SpecLimits::from_rows(&read_limits_csv(path)?)
    } else if args.limits_from_store {
        open_store(&config)?.load_limits()?
    } else {
        SpecLimits::default()
    };

    let summary = stats::summarize(&table, &limits)?;
    let rows = analysis_rows(&table, &summary);

    if let Some(out) = render_structured(&rows, global.format)? {
        print!("{}", out);
        return Ok(());
    }

    if rows.is_empty() {
        if !global.quiet {
            println!("No measurements in {}", args.file.display());
        }
        return Ok(());
    }

    let mut out = Table::new(&["sku", "n", "mean", "variance", "std_dev", "sigma_level"]);
    for row in &rows {
        out.push_row(vec![
            row.sku.clone(),
            row.count.to_string(),
            format_value(row.mean),
            format_value(row.variance),
            format_value(row.std_dev),
            format_value(row.sigma_level),
        ]);
    }
    print!("{}", out.render(global.format));

    if !global.quiet && limits.sku_count() == 0 {
        eprintln!(
            "{} No limits given; sigma level needs --limits or --limits-from-store",
            style("!").yellow()
        );
    }

    Ok(())
}

fn analysis_rows(table: &MeasurementTable, summary: &CapabilitySummary) -> Vec<AnalysisRow> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in table.rows() {
        *counts.entry(row.sku.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(sku, count)| AnalysisRow {
            sku: sku.to_string(),
            count,
            mean: summary.mean.get(sku).copied(),
            variance: summary.variance.get(sku).copied(),
            std_dev: summary.std_dev.get(sku).copied(),
            sigma_level: summary.sigma.get(sku).copied(),
        })
        .collect()
}
