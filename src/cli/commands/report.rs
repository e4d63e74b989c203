//! `sigstat report` command - stored statistics with control limits

use chrono::Local;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::helpers::{format_value, open_store, write_output};
use crate::cli::table::{render_structured, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::stats::control_limits;
use crate::core::store::{to_stored_value, SpecRecord};
use crate::core::{Config, SpecStore};

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Only report this SKU
    #[arg(long)]
    pub sku: Option<String>,
}

/// One stored record plus its three-sigma control limits
#[derive(Debug, PartialEq, Serialize)]
struct ReportRow {
    #[serde(flatten)]
    record: SpecRecord,
    lcl: Option<f64>,
    ucl: Option<f64>,
}

impl From<SpecRecord> for ReportRow {
    fn from(record: SpecRecord) -> Self {
        let limits = match (record.mean, record.std_dev) {
            (Some(mean), Some(std_dev)) => Some(control_limits(mean, std_dev)),
            _ => None,
        };
        Self {
            lcl: limits.and_then(|l| to_stored_value(l.lcl).ok()),
            ucl: limits.and_then(|l| to_stored_value(l.ucl).ok()),
            record,
        }
    }
}

pub fn run(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    let config = super::setup(global)?;
    let store = open_store(&config)?;

    let records = match &args.sku {
        Some(sku) => store.record(sku)?.map(|r| vec![r]).ok_or_else(|| {
            miette::miette!("No record for SKU '{}' in '{}'", sku, store.table())
        })?,
        None => store.records()?,
    };
    let rows: Vec<ReportRow> = records.into_iter().map(ReportRow::from).collect();

    if let Some(out) = render_structured(&rows, global.format)? {
        return write_output(&out, args.output.as_deref());
    }

    // A file gets a markdown document unless a text format was asked for
    let content = match (global.format, &args.output) {
        (OutputFormat::Auto | OutputFormat::Md, Some(_)) | (OutputFormat::Md, None) => {
            markdown_document(&store, &rows)
        }
        (format, _) => {
            let table = report_table(&rows);
            if table.is_empty() && format == OutputFormat::Auto {
                format!("No records in '{}'\n", store.table())
            } else {
                table.render(format)
            }
        }
    };

    write_output(&content, args.output.as_deref())
}

/// Write the markdown report of every stored record into `report_dir`
///
/// Returns the path of the new chart file.
pub(crate) fn write_control_chart(config: &Config) -> Result<PathBuf> {
    let store = open_store(config)?;
    let rows: Vec<ReportRow> = store.records()?.into_iter().map(ReportRow::from).collect();

    std::fs::create_dir_all(&config.report_dir).into_diagnostic()?;
    let path = config.report_dir.join(format!(
        "control_chart_{}.md",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, markdown_document(&store, &rows)).into_diagnostic()?;
    log::info!("Control chart written to {}", path.display());
    Ok(path)
}

fn report_table(rows: &[ReportRow]) -> Table {
    let mut table = Table::new(&[
        "sku",
        "lsl",
        "usl",
        "mean",
        "variance",
        "std_dev",
        "sigma_level",
        "lcl",
        "ucl",
    ]);
    for row in rows {
        let r = &row.record;
        table.push_row(vec![
            r.sku.clone(),
            format_value(r.lsl),
            format_value(r.usl),
            format_value(r.mean),
            format_value(r.variance),
            format_value(r.std_dev),
            format_value(r.sigma_level),
            format_value(row.lcl),
            format_value(row.ucl),
        ]);
    }
    table
}

fn markdown_document(store: &SpecStore, rows: &[ReportRow]) -> String {
    let table = report_table(rows);
    let mut content = String::from("# Process Capability Report\n\n");
    content.push_str(&format!(
        "Table `{}` in `{}`, generated {}\n\n",
        store.table(),
        store.path().display(),
        Local::now().format("%Y-%m-%d %H:%M")
    ));
    if table.is_empty() {
        content.push_str("No records stored.\n");
        return content;
    }
    content.push_str(&table.render(OutputFormat::Md));
    content.push_str(&format!("\n{} SKU(s)\n", table.len()));
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_row_control_limits() {
        let row = ReportRow::from(SpecRecord {
            sku: "A".to_string(),
            mean: Some(12.0),
            std_dev: Some(1.63),
            ..Default::default()
        });
        assert_eq!(row.ucl, Some(16.89));
        assert_eq!(row.lcl, Some(7.11));
    }

    #[test]
    fn test_report_row_without_statistics() {
        let row = ReportRow::from(SpecRecord {
            sku: "A".to_string(),
            lsl: Some(5.0),
            ..Default::default()
        });
        assert_eq!(row.ucl, None);
        assert_eq!(row.lcl, None);
    }

    #[test]
    fn test_write_control_chart() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            database: tmp.path().join("spec.db"),
            report_dir: tmp.path().join("charts"),
            ..Default::default()
        };
        let mut store = open_store(&config).unwrap();
        store.put_limits("A", Some(5.0), Some(20.0)).unwrap();
        drop(store);

        let path = write_control_chart(&config).unwrap();

        assert_eq!(path.parent(), Some(config.report_dir.as_path()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("control_chart_") && name.ends_with(".md"));
        let chart = std::fs::read_to_string(&path).unwrap();
        assert!(chart.starts_with("# Process Capability Report"));
        assert!(chart.contains("| A "));
        assert!(chart.contains("1 SKU(s)"));
    }

    #[test]
    fn test_markdown_document_without_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            database: tmp.path().join("spec.db"),
            ..Default::default()
        };
        let store = open_store(&config).unwrap();

        let doc = markdown_document(&store, &[]);
        assert!(doc.contains("No records stored."));
        assert!(!doc.contains("SKU(s)"));
    }
}
